//! Hashtag index cache: a newest-first list of `author\ttime\tbody` lines per tag.

use std::sync::Arc;

use metrics::counter;

use crate::domain::posts::{extract_hashtags, hashtag_line};

use super::engine::CacheEngine;
use super::error::CacheError;
use super::keys::CacheKey;

#[derive(Clone)]
pub struct HashtagIndexCache {
    engine: Arc<dyn CacheEngine>,
}

impl HashtagIndexCache {
    pub fn new(engine: Arc<dyn CacheEngine>) -> Self {
        Self { engine }
    }

    pub async fn index_post(
        &self,
        tag: &str,
        author: &str,
        timestamp: &str,
        rendered_body: &str,
    ) -> Result<(), CacheError> {
        self.engine
            .lpush(
                &CacheKey::hashtag(tag),
                &hashtag_line(author, timestamp, rendered_body),
            )
            .await
    }

    /// Index one post under every distinct tag in its raw text. Returns the
    /// number of tags written.
    pub async fn index_all(
        &self,
        author: &str,
        timestamp: &str,
        raw_body: &str,
        rendered_body: &str,
    ) -> Result<usize, CacheError> {
        let tags = extract_hashtags(raw_body);
        for tag in &tags {
            self.index_post(tag, author, timestamp, rendered_body)
                .await?;
        }
        Ok(tags.len())
    }

    /// Same `0..=limit` window as the author timeline.
    pub async fn recent_by_tag(&self, tag: &str, limit: usize) -> Result<Vec<String>, CacheError> {
        counter!("warbler_hashtag_cache_read_total").increment(1);
        let stop = isize::try_from(limit).unwrap_or(isize::MAX);
        self.engine.lrange(&CacheKey::hashtag(tag), 0, stop).await
    }
}
