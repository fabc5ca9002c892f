use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("post body must not be empty")]
    EmptyPost,
    #[error("invalid cursor `{value}`: {reason}")]
    InvalidCursor { value: String, reason: String },
    #[error("malformed {kind} line `{line}`")]
    MalformedLine { kind: &'static str, line: String },
}

impl DomainError {
    pub fn invalid_cursor(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidCursor {
            value: value.into(),
            reason: reason.into(),
        }
    }

    pub fn malformed_line(kind: &'static str, line: impl Into<String>) -> Self {
        Self::MalformedLine {
            kind,
            line: line.into(),
        }
    }
}
