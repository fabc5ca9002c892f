//! Home timeline cache: one fully rendered home page per viewer.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use super::engine::CacheEngine;
use super::error::CacheError;
use super::keys::CacheKey;

/// Rendered home pages keyed by viewer, stored without expiry.
///
/// # Invalidation policy
///
/// Invalidation is owner-scoped. Posting, following and unfollowing delete
/// only the acting user's own entry. Followers of the actor keep their cached
/// page, which stays stale until they perform a mutating action themselves.
/// Nothing in this type fans out to other viewers and callers must not add
/// such fan-out.
#[derive(Clone)]
pub struct HomeTimelineCache {
    engine: Arc<dyn CacheEngine>,
}

impl HomeTimelineCache {
    pub fn new(engine: Arc<dyn CacheEngine>) -> Self {
        Self { engine }
    }

    /// `Ok(None)` is a miss, the signal to compose the page.
    pub async fn get(&self, viewer: &str) -> Result<Option<String>, CacheError> {
        let cached = self.engine.get(&CacheKey::home(viewer)).await?;
        if cached.is_some() {
            counter!("warbler_home_cache_hit_total").increment(1);
        } else {
            counter!("warbler_home_cache_miss_total").increment(1);
            debug!(target = "warbler::cache::home", viewer, "home cache miss");
        }
        Ok(cached)
    }

    pub async fn put(&self, viewer: &str, fragment: &str) -> Result<(), CacheError> {
        self.engine.set(&CacheKey::home(viewer), fragment).await
    }

    /// Drop the viewer's own entry. Only ever called with the acting user.
    pub async fn invalidate(&self, viewer: &str) -> Result<(), CacheError> {
        counter!("warbler_home_cache_invalidate_total").increment(1);
        self.engine.del(&CacheKey::home(viewer)).await
    }
}
