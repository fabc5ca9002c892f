//! Cache engine configuration.
//!
//! Selects the engine adapter and describes where its images live via the
//! `[cache]` table of `warbler.toml`.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::EngineKind;

use super::snapshot::SnapshotFiles;

const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
const DEFAULT_LIVE_SNAPSHOT: &str = "/var/lib/redis/dump.rdb";
const DEFAULT_SEED_SNAPSHOT: &str = "/var/lib/redis/init.rdb";
const DEFAULT_SYSTEMD_UNIT: &str = "redis";
const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_START_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub engine: EngineKind,
    /// Connection URL, used only by the Redis engine.
    pub redis_url: String,
    /// Image the engine loads on start and writes on save.
    pub live_snapshot: PathBuf,
    /// Baked image restored on reset.
    pub seed_snapshot: PathBuf,
    /// Service unit controlled when the engine runs out of process.
    pub systemd_unit: String,
    /// How long to wait for the engine to stop answering after a stop.
    pub stop_timeout: Duration,
    /// How long to wait for the engine to answer after a start.
    pub start_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Redis,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            live_snapshot: PathBuf::from(DEFAULT_LIVE_SNAPSHOT),
            seed_snapshot: PathBuf::from(DEFAULT_SEED_SNAPSHOT),
            systemd_unit: DEFAULT_SYSTEMD_UNIT.to_string(),
            stop_timeout: Duration::from_millis(DEFAULT_STOP_TIMEOUT_MS),
            start_timeout: Duration::from_millis(DEFAULT_START_TIMEOUT_MS),
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            engine: settings.engine,
            redis_url: settings.redis_url.clone(),
            live_snapshot: settings.live_snapshot.clone(),
            seed_snapshot: settings.seed_snapshot.clone(),
            systemd_unit: settings.systemd_unit.clone(),
            stop_timeout: settings.stop_timeout,
            start_timeout: settings.start_timeout,
        }
    }
}

impl CacheConfig {
    pub fn snapshot_files(&self) -> SnapshotFiles {
        SnapshotFiles::new(self.live_snapshot.clone(), self.seed_snapshot.clone())
    }

    /// The in-process engine persists to the live snapshot itself.
    pub fn is_in_process(&self) -> bool {
        self.engine == EngineKind::Memory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert_eq!(config.engine, EngineKind::Redis);
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379/");
        assert_eq!(config.systemd_unit, "redis");
        assert_eq!(config.stop_timeout, Duration::from_secs(10));
        assert!(!config.is_in_process());
    }

    #[test]
    fn snapshot_files_follow_config() {
        let config = CacheConfig {
            engine: EngineKind::Memory,
            live_snapshot: PathBuf::from("/tmp/live.json"),
            seed_snapshot: PathBuf::from("/tmp/seed.json"),
            ..Default::default()
        };
        let files = config.snapshot_files();
        assert_eq!(files.live(), std::path::Path::new("/tmp/live.json"));
        assert_eq!(files.seed(), std::path::Path::new("/tmp/seed.json"));
        assert!(config.is_in_process());
    }
}
