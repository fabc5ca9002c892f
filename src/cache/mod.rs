//! Derived-view cache.
//!
//! Four views sit in front of the record store, all stored in one cache
//! engine:
//!
//! - **Home timeline**: one rendered home page per viewer, invalidated only
//!   by the viewer's own actions
//! - **Author timeline**: recent posts per author, appended on write
//! - **Hashtag index**: recent posts per tag, appended on write
//! - **Social graph**: the set of names each user follows
//!
//! ## Configuration
//!
//! The engine is selected via `warbler.toml`:
//!
//! ```toml
//! [cache]
//! engine = "redis"            # or "memory"
//! redis_url = "redis://127.0.0.1:6379/"
//! live_snapshot = "/var/lib/redis/dump.rdb"
//! seed_snapshot = "/var/lib/redis/init.rdb"
//! # ... see config.rs for all options
//! ```

mod author;
mod config;
mod engine;
mod error;
mod graph;
mod hashtag;
mod home;
mod keys;
mod memory;
mod redis_engine;
mod snapshot;

use std::sync::Arc;

pub use author::AuthorTimelineCache;
pub use config::CacheConfig;
pub use engine::{CacheEngine, EngineSupervisor};
pub use error::CacheError;
pub use graph::SocialGraphCache;
pub use hashtag::HashtagIndexCache;
pub use home::HomeTimelineCache;
pub use keys::{CacheKey, KeyKind};
pub use memory::MemoryEngine;
pub use redis_engine::RedisEngine;
pub use snapshot::SnapshotFiles;

/// The derived views over one shared engine.
#[derive(Clone)]
pub struct Caches {
    pub engine: Arc<dyn CacheEngine>,
    pub home: HomeTimelineCache,
    pub author: AuthorTimelineCache,
    pub hashtags: HashtagIndexCache,
    pub graph: SocialGraphCache,
}

impl Caches {
    pub fn new(engine: Arc<dyn CacheEngine>) -> Self {
        Self {
            home: HomeTimelineCache::new(engine.clone()),
            author: AuthorTimelineCache::new(engine.clone()),
            hashtags: HashtagIndexCache::new(engine.clone()),
            graph: SocialGraphCache::new(engine.clone()),
            engine,
        }
    }
}
