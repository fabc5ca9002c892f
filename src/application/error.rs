use std::error::Error as StdError;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::{
    application::{follows::FollowGraphError, rebuild::RebuildError, repos::RepoError},
    cache::CacheError,
    domain::error::DomainError,
    infra::error::InfraError,
    presentation::views::TemplateRenderError,
};

#[derive(Debug, Clone)]
pub struct ErrorReport {
    pub source: &'static str,
    pub status: StatusCode,
    pub messages: Vec<String>,
}

impl ErrorReport {
    pub fn from_error(source: &'static str, status: StatusCode, error: &dyn StdError) -> Self {
        let mut messages = Vec::new();
        messages.push(error.to_string());
        let mut current = error.source();
        while let Some(inner) = current {
            messages.push(inner.to_string());
            current = inner.source();
        }
        Self {
            source,
            status,
            messages,
        }
    }

    pub fn from_message(
        source: &'static str,
        status: StatusCode,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source,
            status,
            messages: vec![message.into()],
        }
    }

    pub fn attach(self, response: &mut Response) {
        response.extensions_mut().insert(self);
    }
}

/// Outcome classes callers and the transport boundary act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    StartupFatal,
    RebuildFailure,
    Internal,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    FollowGraph(#[from] FollowGraphError),
    #[error(transparent)]
    Rebuild(#[from] RebuildError),
    #[error("startup failed: {0}")]
    Startup(#[from] InfraError),
    #[error(transparent)]
    Render(#[from] TemplateRenderError),
}

impl AppError {
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::NotFound(_) | AppError::Repo(RepoError::NotFound) => ErrorKind::NotFound,
            AppError::BadRequest(_)
            | AppError::Domain(_)
            | AppError::Repo(_)
            | AppError::Cache(_)
            | AppError::FollowGraph(_) => ErrorKind::BadRequest,
            AppError::Rebuild(_) => ErrorKind::RebuildFailure,
            AppError::Startup(_) => ErrorKind::StartupFatal,
            AppError::Render(_) => ErrorKind::Internal,
        }
    }

    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::StartupFatal | ErrorKind::RebuildFailure | ErrorKind::Internal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn presentation_message(&self) -> &'static str {
        match self.kind() {
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::BadRequest => "Request could not be processed",
            ErrorKind::RebuildFailure => "Rebuild failed",
            ErrorKind::StartupFatal => "Service misconfigured",
            ErrorKind::Internal => "Unexpected error occurred",
        }
    }

    fn report_source(&self) -> &'static str {
        match self {
            AppError::Render(err) => err.origin(),
            _ => "application::error::AppError",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.presentation_message();
        let report = ErrorReport::from_error(self.report_source(), status, &self);
        let mut response = (status, message).into_response();
        report.attach(&mut response);
        response
    }
}
