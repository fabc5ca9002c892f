use askama::{Error as AskamaError, Template};
use axum::response::Html;
use thiserror::Error;

use crate::domain::posts::TimelineEntry;

#[derive(Debug, Error)]
#[error("{public_message}")]
pub struct TemplateRenderError {
    pub(crate) source: &'static str,
    pub(crate) public_message: &'static str,
    #[source]
    pub(crate) error: AskamaError,
}

impl TemplateRenderError {
    pub fn new(source: &'static str, public_message: &'static str, error: AskamaError) -> Self {
        Self {
            source,
            public_message,
            error,
        }
    }

    pub fn origin(&self) -> &'static str {
        self.source
    }
}

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, TemplateRenderError> {
    template.render().map(Html).map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_template",
            "Template rendering failed",
            err,
        )
    })
}

/// Render the post list fragment that timeline caches store and `append`
/// requests return.
pub fn render_post_list(entries: &[TimelineEntry]) -> Result<String, TemplateRenderError> {
    let posts = entries.iter().map(PostView::from).collect();
    PostListTemplate { posts }.render().map_err(|err| {
        TemplateRenderError::new(
            "presentation::views::render_post_list",
            "Template rendering failed",
            err,
        )
    })
}

pub use crate::domain::posts::path_segment;

/// Form-encode a query string value.
pub fn query_value(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

#[derive(Debug, Clone)]
pub struct PostView {
    pub author: String,
    pub author_href: String,
    pub time: String,
    /// Already escaped with hashtags rewritten to links.
    pub html: String,
}

impl From<&TimelineEntry> for PostView {
    fn from(entry: &TimelineEntry) -> Self {
        Self {
            author: entry.author.clone(),
            author_href: path_segment(&entry.author),
            time: entry.time.clone(),
            html: entry.html.clone(),
        }
    }
}

#[derive(Template)]
#[template(path = "partials/posts.html")]
pub struct PostListTemplate {
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub viewer: Option<String>,
    pub posts_html: String,
}

#[derive(Template)]
#[template(path = "author.html")]
pub struct AuthorTemplate {
    pub viewer: Option<String>,
    pub author: String,
    pub author_href: String,
    pub is_own: bool,
    pub is_following: bool,
    pub posts_html: String,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub viewer: Option<String>,
    pub query: String,
    pub more_path: String,
    pub posts_html: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(author: &str, html: &str) -> TimelineEntry {
        TimelineEntry {
            author: author.to_string(),
            time: "2017-10-21 09:05:03".to_string(),
            html: html.to_string(),
        }
    }

    #[test]
    fn post_list_keeps_rendered_body_and_escapes_author() {
        let html = render_post_list(&[entry(
            "a<b",
            r#"hi <a class="hashtag" href="/hashtag/go">#go</a>"#,
        )])
        .expect("render");

        assert!(html.contains(r#"<a class="hashtag" href="/hashtag/go">#go</a>"#));
        assert!(html.contains("a&#60;b") || html.contains("a&lt;b"));
        assert!(html.contains(r#"href="/a%3Cb""#));
        assert!(html.contains(r#"data-time="2017-10-21 09:05:03""#));
    }

    #[test]
    fn empty_list_renders_no_posts() {
        let html = render_post_list(&[]).expect("render");
        assert!(!html.contains("class=\"post\""));
    }

    #[test]
    fn anonymous_home_shows_landing() {
        let page = render_template(HomeTemplate {
            viewer: None,
            posts_html: String::new(),
        })
        .expect("render");
        assert!(page.0.contains("landing"));
        assert!(!page.0.contains("compose"));
    }

    #[test]
    fn author_page_offers_follow_to_other_viewers() {
        let page = render_template(AuthorTemplate {
            viewer: Some("alice".to_string()),
            author: "bob".to_string(),
            author_href: "bob".to_string(),
            is_own: false,
            is_following: false,
            posts_html: String::new(),
        })
        .expect("render");
        assert!(page.0.contains(r#"action="/follow""#));

        let own = render_template(AuthorTemplate {
            viewer: Some("bob".to_string()),
            author: "bob".to_string(),
            author_href: "bob".to_string(),
            is_own: true,
            is_following: false,
            posts_html: String::new(),
        })
        .expect("render");
        assert!(!own.0.contains(r#"action="/follow""#));
    }
}
