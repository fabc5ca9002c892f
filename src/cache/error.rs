use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The engine could not be reached or the connection failed mid-command.
    #[error("cache engine unavailable: {0}")]
    Unavailable(String),
    /// The engine answered with something the adapter did not expect.
    #[error("unexpected cache reply: {0}")]
    Protocol(String),
    #[error("snapshot failure: {0}")]
    Snapshot(String),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn snapshot(message: impl Into<String>) -> Self {
        Self::Snapshot(message.into())
    }

    /// Whether repeating the same command could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CacheError::Unavailable(_))
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.kind() == redis::ErrorKind::TypeError {
            return CacheError::protocol(err.to_string());
        }
        if err.is_io_error() || err.is_connection_dropped() || err.is_timeout() {
            return CacheError::unavailable(err.to_string());
        }
        CacheError::protocol(err.to_string())
    }
}
