mod middleware;
mod public;
mod viewer;

pub use public::{HttpState, build_router};
pub use viewer::{VIEWER_HEADER, Viewer};

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::application::error::{AppError, ErrorReport};

fn health_response(result: Result<(), AppError>) -> Response {
    match result {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            let mut response = StatusCode::SERVICE_UNAVAILABLE.into_response();
            ErrorReport::from_error(
                "infra::http::health",
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )
            .attach(&mut response);
            response
        }
    }
}
