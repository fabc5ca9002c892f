//! Cache engine boundary.

use async_trait::async_trait;

use super::error::CacheError;
use super::keys::CacheKey;

/// Key-value, list and set commands used by the derived-view caches.
///
/// Each call is atomic on its own; sequences of calls are not. Values never
/// expire, entries disappear only through `del`, `flush_all`, or a snapshot
/// restore.
#[async_trait]
pub trait CacheEngine: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), CacheError>;

    async fn del(&self, key: &CacheKey) -> Result<(), CacheError>;

    async fn lpush(&self, key: &CacheKey, value: &str) -> Result<(), CacheError>;

    /// Inclusive on both ends; negative indices count from the tail.
    async fn lrange(
        &self,
        key: &CacheKey,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError>;

    async fn sadd(&self, key: &CacheKey, member: &str) -> Result<(), CacheError>;

    async fn srem(&self, key: &CacheKey, member: &str) -> Result<(), CacheError>;

    async fn smembers(&self, key: &CacheKey) -> Result<Vec<String>, CacheError>;

    async fn flush_all(&self) -> Result<(), CacheError>;

    /// Synchronously persist the whole key space to the engine's live image.
    async fn save(&self) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;
}

/// Controls the engine process so its persisted image can be swapped.
#[async_trait]
pub trait EngineSupervisor: Send + Sync {
    async fn stop(&self) -> Result<(), CacheError>;

    async fn start(&self) -> Result<(), CacheError>;
}
