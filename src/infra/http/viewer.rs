//! Viewer identity supplied by the upstream session layer.

use std::convert::Infallible;

use axum::{extract::FromRequestParts, http::request::Parts};

pub const VIEWER_HEADER: &str = "x-warbler-user";

/// The signed-in user's name, or `None` for anonymous requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Viewer(pub Option<String>);

impl Viewer {
    pub fn name(&self) -> Option<&str> {
        self.0.as_deref()
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let name = parts
            .headers
            .get(VIEWER_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);
        Ok(Viewer(name))
    }
}
