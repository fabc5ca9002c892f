mod support;

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use support::{Harness, rendered_posts};
use tower::ServiceExt;
use warbler::application::repos::SeedBoundary;
use warbler::cache::{EngineSupervisor, MemoryEngine, SnapshotFiles};
use warbler::infra::http::{HttpState, VIEWER_HEADER, build_router};

struct App {
    harness: Harness,
    router: Router,
    _dir: tempfile::TempDir,
}

async fn app(users: &[&str]) -> App {
    let dir = tempfile::tempdir().expect("tempdir");
    let snapshots = SnapshotFiles::new(dir.path().join("live.json"), dir.path().join("seed.json"));
    let engine = MemoryEngine::open(snapshots.live())
        .await
        .expect("engine opens");
    let harness = Harness::with_engine(users, Arc::new(engine)).await;

    let rebuild = harness.rebuild(
        snapshots,
        SeedBoundary {
            post_cutoff: 1,
            user_cutoff: users.len() as i64,
        },
    );
    let state = HttpState {
        timelines: harness.timelines.clone(),
        activity: harness.activity.clone(),
        rebuild: Arc::new(rebuild),
        engine: harness.engine.clone(),
        store: harness.store.clone(),
    };

    App {
        router: build_router(state),
        harness,
        _dir: dir,
    }
}

impl App {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond")
    }

    async fn get(&self, uri: &str, viewer: Option<&str>) -> Response {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(viewer) = viewer {
            builder = builder.header(VIEWER_HEADER, viewer);
        }
        self.send(builder.body(Body::empty()).expect("request should build"))
            .await
    }

    async fn post_form(&self, uri: &str, viewer: Option<&str>, form: &str) -> Response {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(viewer) = viewer {
            builder = builder.header(VIEWER_HEADER, viewer);
        }
        self.send(
            builder
                .body(Body::from(form.to_string()))
                .expect("request should build"),
        )
        .await
    }
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should read");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

fn assert_redirects_home(response: &Response) {
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response
            .headers()
            .get(header::LOCATION)
            .and_then(|value| value.to_str().ok()),
        Some("/")
    );
}

#[tokio::test]
async fn anonymous_home_renders_the_landing_page() {
    let app = app(&["alice"]).await;
    let response = app.get("/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("<!DOCTYPE html>"));
    assert!(body.contains(r#"class="landing""#));
}

#[tokio::test]
async fn anonymous_mutations_redirect_without_writing() {
    let app = app(&["alice"]).await;
    let response = app.post_form("/", None, "text=hello").await;
    assert_redirects_home(&response);
    assert_eq!(app.harness.store.post_count(), 0);

    let response = app.post_form("/follow", None, "user=alice").await;
    assert_redirects_home(&response);
}

#[tokio::test]
async fn post_follow_and_read_home() {
    let app = app(&["alice", "bob"]).await;

    let response = app.post_form("/follow", Some("alice"), "user=bob").await;
    assert_redirects_home(&response);

    let response = app
        .post_form("/", Some("bob"), "text=hello+%23go")
        .await;
    assert_redirects_home(&response);

    let response = app.get("/", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains("@alice"));
    let posts = rendered_posts(&body);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "bob");

    let response = app.get("/bob", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains(r#"action="/unfollow""#));
    assert_eq!(rendered_posts(&body).len(), 1);

    let response = app.post_form("/unfollow", Some("alice"), "user=bob").await;
    assert_redirects_home(&response);
    let body = body_text(app.get("/bob", Some("alice")).await).await;
    assert!(body.contains(r#"action="/follow""#));
}

#[tokio::test]
async fn append_requests_return_only_the_fragment() {
    let app = app(&["bob"]).await;
    app.post_form("/", Some("bob"), "text=tagged+%23go").await;

    let response = app.get("/hashtag/go?append=1", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(!body.contains("<!DOCTYPE html>"));
    assert_eq!(rendered_posts(&body).len(), 1);

    let body = body_text(app.get("/?append=1", None).await).await;
    assert!(body.is_empty());
}

#[tokio::test]
async fn search_by_tag_and_text() {
    let app = app(&["bob"]).await;
    app.post_form("/", Some("bob"), "text=tagged+%23go").await;
    app.post_form("/", Some("bob"), "text=plain+words").await;

    let body = body_text(app.get("/search?q=%23go", None).await).await;
    let posts = rendered_posts(&body);
    assert_eq!(posts.len(), 1);
    assert!(posts[0].1.starts_with("tagged "));

    let body = body_text(app.get("/search?q=words", None).await).await;
    let posts = rendered_posts(&body);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1, "plain words");
    assert!(body.contains(r#"data-more="/search?q=words""#));
}

#[tokio::test]
async fn rendered_links_route_back_to_the_same_user_and_tag() {
    let app = app(&["alice", "mary ann"]).await;
    app.post_form("/follow", Some("alice"), "user=mary+ann").await;
    app.post_form("/", Some("mary ann"), "text=learning+%23c%2B%2B").await;

    let body = body_text(app.get("/", Some("alice")).await).await;
    assert!(body.contains(r#"href="/mary%20ann""#));
    assert!(body.contains(r#"href="/hashtag/c++""#));

    let response = app.get("/mary%20ann", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(rendered_posts(&body_text(response).await).len(), 1);

    let response = app.get("/hashtag/c++", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let posts = rendered_posts(&body_text(response).await);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "mary ann");
}

#[tokio::test]
async fn unknown_viewers_are_not_found() {
    let app = app(&["alice", "bob"]).await;

    let response = app.post_form("/follow", Some("ghost"), "user=bob").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.get("/", Some("ghost")).await.status(), StatusCode::NOT_FOUND);
    assert!(app.harness.caches.home.get("ghost").await.expect("get").is_none());
}

#[tokio::test]
async fn failures_map_to_status_codes() {
    let app = app(&["alice"]).await;

    let response = app.get("/nobody", None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.post_form("/follow", Some("alice"), "user=nobody").await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.post_form("/", Some("alice"), "text=").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app.get("/?until=yesterday", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cache_failures_are_bad_requests() {
    let app = app(&["alice"]).await;
    app.harness.engine.stop().await.expect("stop");

    let response = app.get("/", Some("alice")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn health_reflects_the_cache_engine() {
    let app = app(&["alice"]).await;
    assert_eq!(app.get("/_health", None).await.status(), StatusCode::NO_CONTENT);

    app.harness.engine.stop().await.expect("stop");
    assert_eq!(
        app.get("/_health", None).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}

#[tokio::test]
async fn initialize_endpoints_bake_and_reset() {
    let app = app(&["alice", "bob"]).await;
    app.post_form("/", Some("bob"), "text=seeded").await;

    let response = app.get("/initialize_cache", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: serde_json::Value =
        serde_json::from_str(&body_text(response).await).expect("json body");
    assert_eq!(report["result"], "ok");
    assert_eq!(report["posts"], 1);

    app.post_form("/", Some("bob"), "text=discarded").await;

    let response = app.get("/initialize", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let report: serde_json::Value =
        serde_json::from_str(&body_text(response).await).expect("json body");
    assert_eq!(report["result"], "ok");
    assert_eq!(report["truncated"]["posts"], 1);

    let body = body_text(app.get("/bob", None).await).await;
    let posts = rendered_posts(&body);
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].1, "seeded");
}

#[tokio::test]
async fn failed_rebuild_is_a_server_error() {
    let app = app(&["alice"]).await;

    // No seed image has been baked yet.
    let response = app.get("/initialize", None).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
