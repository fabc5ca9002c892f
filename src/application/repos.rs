//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{LegacyFollowRow, PostRecord, UserId, UserRecord};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: UserId,
    pub body: String,
}

/// Rows with ids above these cutoffs were created after the seed was taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedBoundary {
    pub post_cutoff: i64,
    pub user_cutoff: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TruncateReport {
    pub posts: u64,
    pub users: u64,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<UserRecord>, RepoError>;

    async fn find_by_name(&self, name: &str) -> Result<Option<UserRecord>, RepoError>;

    async fn list_users(&self) -> Result<Vec<UserRecord>, RepoError>;
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// All posts, newest first, optionally strictly older than `before`.
    ///
    /// Consumers stop polling once they have enough rows; the adapter must not
    /// buffer the whole table.
    fn scan_posts(
        &self,
        before: Option<OffsetDateTime>,
    ) -> BoxStream<'_, Result<PostRecord, RepoError>>;

    /// All posts, oldest first.
    fn scan_posts_ascending(&self) -> BoxStream<'_, Result<PostRecord, RepoError>>;

    /// Up to `limit` posts by one author, newest first, strictly older than `before`.
    async fn list_by_author(
        &self,
        user_id: UserId,
        before: Option<OffsetDateTime>,
        limit: usize,
    ) -> Result<Vec<PostRecord>, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    /// Insert with the store's current time as the creation time.
    async fn insert_post(&self, post: NewPost) -> Result<PostRecord, RepoError>;
}

#[async_trait]
pub trait SeedRepo: Send + Sync {
    async fn truncate_above(&self, boundary: SeedBoundary) -> Result<TruncateReport, RepoError>;
}

/// Follow edges stored in the pre-cache `me` / comma-joined `friends` layout.
#[async_trait]
pub trait LegacyFollowsRepo: Send + Sync {
    async fn list_legacy_follows(&self) -> Result<Vec<LegacyFollowRow>, RepoError>;
}

#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn health_check(&self) -> Result<(), RepoError>;
}
