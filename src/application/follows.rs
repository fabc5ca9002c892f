//! Follow-graph collaborator boundary.
//!
//! Deployments either keep follow sets in the cache engine
//! ([`crate::cache::SocialGraphCache`]) or delegate them to an external
//! service ([`crate::infra::follow_client::RemoteFollowGraph`]).

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum FollowGraphError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error("follow service request failed: {0}")]
    Transport(String),
    #[error("follow service answered {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("follow service reply could not be decoded: {0}")]
    Decode(String),
}

impl FollowGraphError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

#[async_trait]
pub trait FollowGraph: Send + Sync {
    /// Names `name` follows. Failing to reach the graph is an error, never an
    /// empty set.
    async fn followees(&self, name: &str) -> Result<BTreeSet<String>, FollowGraphError>;

    async fn follow(&self, follower: &str, followee: &str) -> Result<(), FollowGraphError>;

    async fn unfollow(&self, follower: &str, followee: &str) -> Result<(), FollowGraphError>;

    /// Return the graph to its seed state.
    async fn reset(&self) -> Result<(), FollowGraphError>;

    /// Whether the graph lives in the cache engine and is therefore part of
    /// the baked seed image.
    fn is_cache_backed(&self) -> bool {
        false
    }
}
