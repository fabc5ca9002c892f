//! In-process cache engine.
//!
//! Mirrors the subset of Redis semantics the caches rely on, including a
//! durable image on disk so the seed snapshot workflow can run without an
//! external engine. It also supervises itself: `stop` drops the in-memory
//! key space the way a process exit would, and `start` reloads the image.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::engine::{CacheEngine, EngineSupervisor};
use super::error::CacheError;
use super::keys::CacheKey;

const WRONG_TYPE: &str = "WRONGTYPE operation against a key holding the wrong kind of value";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
enum Entry {
    Text(String),
    List(VecDeque<String>),
    Set(BTreeSet<String>),
}

pub struct MemoryEngine {
    entries: RwLock<HashMap<String, Entry>>,
    running: AtomicBool,
    image: Option<PathBuf>,
}

impl MemoryEngine {
    /// A running engine without a durable image; `save` fails.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            running: AtomicBool::new(true),
            image: None,
        }
    }

    /// Start an engine backed by `image`, loading it when the file exists.
    pub async fn open(image: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let engine = Self {
            entries: RwLock::new(HashMap::new()),
            running: AtomicBool::new(false),
            image: Some(image.into()),
        };
        engine.start().await?;
        Ok(engine)
    }

    pub fn image_path(&self) -> Option<&Path> {
        self.image.as_deref()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn ensure_running(&self) -> Result<(), CacheError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(CacheError::unavailable("memory engine is stopped"))
        }
    }

    async fn load_image(&self) -> Result<HashMap<String, Entry>, CacheError> {
        let Some(path) = self.image.as_ref() else {
            return Ok(HashMap::new());
        };

        match tokio::fs::read(path).await {
            Ok(bytes) => {
                let image: BTreeMap<String, Entry> =
                    serde_json::from_slice(&bytes).map_err(|err| {
                        CacheError::snapshot(format!("failed to decode {}: {err}", path.display()))
                    })?;
                Ok(image.into_iter().collect())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(CacheError::snapshot(format!(
                "failed to read {}: {err}",
                path.display()
            ))),
        }
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = isize::try_from(len).ok()?;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl CacheEngine for MemoryEngine {
    async fn get(&self, key: &CacheKey) -> Result<Option<String>, CacheError> {
        self.ensure_running()?;
        match self.entries.read().await.get(&key.render()) {
            None => Ok(None),
            Some(Entry::Text(value)) => Ok(Some(value.clone())),
            Some(_) => Err(CacheError::protocol(WRONG_TYPE)),
        }
    }

    async fn set(&self, key: &CacheKey, value: &str) -> Result<(), CacheError> {
        self.ensure_running()?;
        self.entries
            .write()
            .await
            .insert(key.render(), Entry::Text(value.to_string()));
        Ok(())
    }

    async fn del(&self, key: &CacheKey) -> Result<(), CacheError> {
        self.ensure_running()?;
        self.entries.write().await.remove(&key.render());
        Ok(())
    }

    async fn lpush(&self, key: &CacheKey, value: &str) -> Result<(), CacheError> {
        self.ensure_running()?;
        let mut entries = self.entries.write().await;
        match entries
            .entry(key.render())
            .or_insert_with(|| Entry::List(VecDeque::new()))
        {
            Entry::List(list) => {
                list.push_front(value.to_string());
                Ok(())
            }
            _ => Err(CacheError::protocol(WRONG_TYPE)),
        }
    }

    async fn lrange(
        &self,
        key: &CacheKey,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        self.ensure_running()?;
        match self.entries.read().await.get(&key.render()) {
            None => Ok(Vec::new()),
            Some(Entry::List(list)) => Ok(match resolve_range(list.len(), start, stop) {
                Some((from, to)) => list.range(from..=to).cloned().collect(),
                None => Vec::new(),
            }),
            Some(_) => Err(CacheError::protocol(WRONG_TYPE)),
        }
    }

    async fn sadd(&self, key: &CacheKey, member: &str) -> Result<(), CacheError> {
        self.ensure_running()?;
        let mut entries = self.entries.write().await;
        match entries
            .entry(key.render())
            .or_insert_with(|| Entry::Set(BTreeSet::new()))
        {
            Entry::Set(set) => {
                set.insert(member.to_string());
                Ok(())
            }
            _ => Err(CacheError::protocol(WRONG_TYPE)),
        }
    }

    async fn srem(&self, key: &CacheKey, member: &str) -> Result<(), CacheError> {
        self.ensure_running()?;
        let rendered = key.render();
        let mut entries = self.entries.write().await;
        let now_empty = match entries.get_mut(&rendered) {
            None => return Ok(()),
            Some(Entry::Set(set)) => {
                set.remove(member);
                set.is_empty()
            }
            Some(_) => return Err(CacheError::protocol(WRONG_TYPE)),
        };
        if now_empty {
            entries.remove(&rendered);
        }
        Ok(())
    }

    async fn smembers(&self, key: &CacheKey) -> Result<Vec<String>, CacheError> {
        self.ensure_running()?;
        match self.entries.read().await.get(&key.render()) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(CacheError::protocol(WRONG_TYPE)),
        }
    }

    async fn flush_all(&self) -> Result<(), CacheError> {
        self.ensure_running()?;
        self.entries.write().await.clear();
        Ok(())
    }

    async fn save(&self) -> Result<(), CacheError> {
        self.ensure_running()?;
        let path = self
            .image
            .as_ref()
            .ok_or_else(|| CacheError::snapshot("memory engine has no image path"))?;

        let image: BTreeMap<String, Entry> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect();
        let bytes = serde_json::to_vec(&image)
            .map_err(|err| CacheError::snapshot(format!("failed to encode image: {err}")))?;

        let staging = path.with_extension("saving");
        tokio::fs::write(&staging, &bytes)
            .await
            .map_err(|err| CacheError::snapshot(format!("failed to write image: {err}")))?;
        tokio::fs::rename(&staging, path)
            .await
            .map_err(|err| CacheError::snapshot(format!("failed to publish image: {err}")))?;

        debug!(
            target = "warbler::cache::memory",
            keys = image.len(),
            path = %path.display(),
            "saved memory image"
        );
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        self.ensure_running()
    }
}

#[async_trait]
impl EngineSupervisor for MemoryEngine {
    async fn stop(&self) -> Result<(), CacheError> {
        self.running.store(false, Ordering::SeqCst);
        self.entries.write().await.clear();
        info!(target = "warbler::cache::memory", "memory engine stopped");
        Ok(())
    }

    async fn start(&self) -> Result<(), CacheError> {
        let loaded = self.load_image().await?;
        let keys = loaded.len();
        *self.entries.write().await = loaded;
        self.running.store(true, Ordering::SeqCst);
        info!(
            target = "warbler::cache::memory",
            keys, "memory engine started"
        );
        Ok(())
    }
}
