//! Social graph cache: who each user follows, one set per follower.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::application::follows::{FollowGraph, FollowGraphError};

use super::engine::CacheEngine;
use super::error::CacheError;
use super::keys::CacheKey;

#[derive(Clone)]
pub struct SocialGraphCache {
    engine: Arc<dyn CacheEngine>,
}

impl SocialGraphCache {
    pub fn new(engine: Arc<dyn CacheEngine>) -> Self {
        Self { engine }
    }

    pub async fn add_follow(&self, follower: &str, followee: &str) -> Result<(), CacheError> {
        self.engine
            .sadd(&CacheKey::follows(follower), followee)
            .await
    }

    pub async fn remove_follow(&self, follower: &str, followee: &str) -> Result<(), CacheError> {
        self.engine
            .srem(&CacheKey::follows(follower), followee)
            .await
    }

    /// An empty set means the user follows nobody; an unreachable engine is an
    /// error, never an empty set.
    pub async fn list_followees(&self, follower: &str) -> Result<BTreeSet<String>, CacheError> {
        let members = self.engine.smembers(&CacheKey::follows(follower)).await?;
        Ok(members.into_iter().collect())
    }
}

#[async_trait]
impl FollowGraph for SocialGraphCache {
    async fn followees(&self, name: &str) -> Result<BTreeSet<String>, FollowGraphError> {
        Ok(self.list_followees(name).await?)
    }

    async fn follow(&self, follower: &str, followee: &str) -> Result<(), FollowGraphError> {
        Ok(self.add_follow(follower, followee).await?)
    }

    async fn unfollow(&self, follower: &str, followee: &str) -> Result<(), FollowGraphError> {
        Ok(self.remove_follow(follower, followee).await?)
    }

    // The graph lives in the engine's key space, so restoring the seed image
    // already resets it.
    async fn reset(&self) -> Result<(), FollowGraphError> {
        Ok(())
    }

    fn is_cache_backed(&self) -> bool {
        true
    }
}
