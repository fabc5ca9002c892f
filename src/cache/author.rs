//! Author timeline cache: a newest-first list of rendered lines per author.

use std::sync::Arc;

use metrics::counter;

use super::engine::CacheEngine;
use super::error::CacheError;
use super::keys::CacheKey;

#[derive(Clone)]
pub struct AuthorTimelineCache {
    engine: Arc<dyn CacheEngine>,
}

impl AuthorTimelineCache {
    pub fn new(engine: Arc<dyn CacheEngine>) -> Self {
        Self { engine }
    }

    /// Prepend a `time\tbody` line. Lines are never reordered or removed.
    pub async fn append_post(&self, author: &str, line: &str) -> Result<(), CacheError> {
        self.engine
            .lpush(&CacheKey::author_timeline(author), line)
            .await
    }

    /// The most recent lines, newest first.
    ///
    /// The window is `0..=limit`, so up to `limit + 1` lines come back. Older
    /// pages are not served from here; callers go to the record store.
    pub async fn recent_posts(
        &self,
        author: &str,
        limit: usize,
    ) -> Result<Vec<String>, CacheError> {
        counter!("warbler_author_cache_read_total").increment(1);
        let stop = isize::try_from(limit).unwrap_or(isize::MAX);
        self.engine
            .lrange(&CacheKey::author_timeline(author), 0, stop)
            .await
    }
}
