//! Redis-backed cache engine.

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tracing::debug;

use super::engine::CacheEngine;
use super::error::CacheError;
use super::keys::CacheKey;

/// Redis adapter over a reconnecting multiplexed connection. Cloning the
/// manager is cheap and every command runs on its own clone.
#[derive(Clone)]
pub struct RedisEngine {
    conn: ConnectionManager,
}

impl RedisEngine {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!(target = "warbler::cache::redis_engine", "connected to redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CacheEngine for RedisEngine {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        let mut conn = self.conn.clone();
        let value: Option<String> = conn.get(key.render()).await?;
        Ok(value)
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.set(key.render(), value).await?;
        Ok(())
    }

    async fn del(&self, key: &CacheKey) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.del(key.render()).await?;
        Ok(())
    }

    async fn lpush(&self, key: &CacheKey, value: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.lpush(key.render(), value).await?;
        Ok(())
    }

    async fn lrange(
        &self,
        key: &CacheKey,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let values: Vec<String> = conn.lrange(key.render(), start, stop).await?;
        Ok(values)
    }

    async fn sadd(&self, key: &CacheKey, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.sadd(key.render(), member).await?;
        Ok(())
    }

    async fn srem(&self, key: &CacheKey, member: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let _: () = conn.srem(key.render(), member).await?;
        Ok(())
    }

    async fn smembers(&self, key: &CacheKey) -> Result<Vec<String>, CacheError> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(key.render()).await?;
        Ok(members)
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("FLUSHDB").query_async::<()>(&mut conn).await?;
        Ok(())
    }

    async fn save(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        redis::cmd("SAVE")
            .query_async::<()>(&mut conn)
            .await
            .map_err(|err| CacheError::snapshot(err.to_string()))
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply == "PONG" {
            Ok(())
        } else {
            Err(CacheError::protocol(format!("unexpected PING reply `{reply}`")))
        }
    }
}
