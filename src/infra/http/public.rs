use std::sync::Arc;

use axum::{
    Form, Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header::LOCATION},
    middleware,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    application::{
        activity::ActivityService,
        error::AppError,
        rebuild::{BakeReport, RebuildController, ResetReport},
        repos::HealthRepo,
        timeline::TimelineService,
    },
    cache::CacheEngine,
    domain::posts::parse_cursor,
    presentation::views::{
        AuthorTemplate, HomeTemplate, SearchTemplate, path_segment, query_value, render_template,
    },
};

use super::{
    health_response,
    middleware::{log_responses, set_request_context},
    viewer::Viewer,
};

#[derive(Clone)]
pub struct HttpState {
    pub timelines: Arc<TimelineService>,
    pub activity: Arc<ActivityService>,
    pub rebuild: Arc<RebuildController>,
    pub engine: Arc<dyn CacheEngine>,
    pub store: Arc<dyn HealthRepo>,
}

pub fn build_router(state: HttpState) -> Router {
    Router::new()
        .route("/", get(home).post(create_post))
        .route("/follow", post(follow))
        .route("/unfollow", post(unfollow))
        .route("/search", get(search))
        .route("/hashtag/{tag}", get(hashtag))
        .route("/initialize", get(initialize))
        .route("/initialize_cache", get(initialize_cache))
        .route("/_health", get(health))
        .route("/{user}", get(user_page))
        .with_state(state)
        .layer(middleware::from_fn(log_responses))
        .layer(middleware::from_fn(set_request_context))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TimelineQuery {
    until: Option<String>,
    append: Option<String>,
}

impl TimelineQuery {
    fn cursor(&self) -> Result<Option<OffsetDateTime>, AppError> {
        match self.until.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(value) => Ok(Some(parse_cursor(value)?)),
        }
    }

    fn fragment_only(&self) -> bool {
        self.append.as_deref().is_some_and(|value| !value.is_empty())
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchQuery {
    q: String,
    until: Option<String>,
    append: Option<String>,
}

impl SearchQuery {
    fn timeline(&self) -> TimelineQuery {
        TimelineQuery {
            until: self.until.clone(),
            append: self.append.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PostForm {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct FollowForm {
    #[serde(default)]
    user: String,
}

fn found(location: &'static str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location)]).into_response()
}

async fn home(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<TimelineQuery>,
) -> Result<Response, AppError> {
    let cursor = query.cursor()?;
    let Some(name) = viewer.name() else {
        if query.fragment_only() {
            return Ok(Html(String::new()).into_response());
        }
        let page = render_template(HomeTemplate {
            viewer: None,
            posts_html: String::new(),
        })?;
        return Ok(page.into_response());
    };

    let posts_html = state.timelines.home(name, cursor).await?;
    if query.fragment_only() {
        return Ok(Html(posts_html).into_response());
    }

    let page = render_template(HomeTemplate {
        viewer: Some(name.to_string()),
        posts_html,
    })?;
    Ok(page.into_response())
}

async fn create_post(
    State(state): State<HttpState>,
    viewer: Viewer,
    Form(form): Form<PostForm>,
) -> Result<Response, AppError> {
    let Some(name) = viewer.name() else {
        return Ok(found("/"));
    };
    state.activity.post(name, &form.text).await?;
    Ok(found("/"))
}

async fn follow(
    State(state): State<HttpState>,
    viewer: Viewer,
    Form(form): Form<FollowForm>,
) -> Result<Response, AppError> {
    let Some(name) = viewer.name() else {
        return Ok(found("/"));
    };
    state.activity.follow(name, form.user.trim()).await?;
    Ok(found("/"))
}

async fn unfollow(
    State(state): State<HttpState>,
    viewer: Viewer,
    Form(form): Form<FollowForm>,
) -> Result<Response, AppError> {
    let Some(name) = viewer.name() else {
        return Ok(found("/"));
    };
    state.activity.unfollow(name, form.user.trim()).await?;
    Ok(found("/"))
}

async fn search(
    State(state): State<HttpState>,
    viewer: Viewer,
    Query(query): Query<SearchQuery>,
) -> Result<Response, AppError> {
    let more_path = format!("/search?q={}", query_value(query.q.trim()));
    render_search(&state, viewer, &query.q, &query.timeline(), more_path).await
}

async fn hashtag(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(tag): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Response, AppError> {
    let more_path = format!("/hashtag/{}", path_segment(&tag));
    render_search(&state, viewer, &format!("#{tag}"), &query, more_path).await
}

async fn render_search(
    state: &HttpState,
    viewer: Viewer,
    raw_query: &str,
    query: &TimelineQuery,
    more_path: String,
) -> Result<Response, AppError> {
    let page = state.timelines.search(raw_query, query.cursor()?).await?;
    if query.fragment_only() {
        return Ok(Html(page.posts_html).into_response());
    }

    let html = render_template(SearchTemplate {
        viewer: viewer.0,
        query: page.query,
        more_path,
        posts_html: page.posts_html,
    })?;
    Ok(html.into_response())
}

async fn user_page(
    State(state): State<HttpState>,
    viewer: Viewer,
    Path(user): Path<String>,
    Query(query): Query<TimelineQuery>,
) -> Result<Response, AppError> {
    let page = state
        .timelines
        .author(viewer.name(), &user, query.cursor()?)
        .await?;
    if query.fragment_only() {
        return Ok(Html(page.posts_html).into_response());
    }

    let html = render_template(AuthorTemplate {
        viewer: viewer.0,
        author_href: path_segment(&page.author.name),
        author: page.author.name,
        is_own: page.is_own,
        is_following: page.is_following,
        posts_html: page.posts_html,
    })?;
    Ok(html.into_response())
}

#[derive(Debug, Serialize)]
struct RebuildResponse<T> {
    result: &'static str,
    #[serde(flatten)]
    report: T,
}

async fn initialize(
    State(state): State<HttpState>,
) -> Result<Json<RebuildResponse<ResetReport>>, AppError> {
    let report = state.rebuild.reset_to_seed().await?;
    Ok(Json(RebuildResponse {
        result: "ok",
        report,
    }))
}

async fn initialize_cache(
    State(state): State<HttpState>,
) -> Result<Json<RebuildResponse<BakeReport>>, AppError> {
    let report = state.rebuild.bake_seed().await?;
    Ok(Json(RebuildResponse {
        result: "ok",
        report,
    }))
}

async fn health(State(state): State<HttpState>) -> Response {
    let engine = state.engine.ping().await.map_err(AppError::from);
    let store = state.store.health_check().await.map_err(AppError::from);
    health_response(engine.and(store))
}
