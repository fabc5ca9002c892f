//! Configuration layer: typed settings with layered precedence (file → env → CLI).

mod cli;

use std::{
    net::SocketAddr,
    num::{NonZeroU32, NonZeroUsize},
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

pub use cli::{
    CacheOverrides, CliArgs, Command, DatabaseOverride, MaintenanceArgs, ServeArgs,
    ServeOverrides,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "warbler";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 16;
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/";
const DEFAULT_LIVE_SNAPSHOT: &str = "/var/lib/redis/dump.rdb";
const DEFAULT_SEED_SNAPSHOT: &str = "/var/lib/redis/init.rdb";
const DEFAULT_SYSTEMD_UNIT: &str = "redis";
const DEFAULT_STOP_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_START_TIMEOUT_MS: u64 = 10_000;
pub(crate) const DEFAULT_PAGE_SIZE: usize = 50;
pub(crate) const DEFAULT_POST_CUTOFF: i64 = 100_000;
pub(crate) const DEFAULT_USER_CUTOFF: i64 = 1_000;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub cache: CacheSettings,
    pub timeline: TimelineSettings,
    pub follow_graph: FollowGraphSettings,
    pub seed: SeedSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    Redis,
    Memory,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Ok(Self::Redis),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown engine `{other}`, expected redis or memory")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub engine: EngineKind,
    pub redis_url: String,
    pub live_snapshot: PathBuf,
    pub seed_snapshot: PathBuf,
    pub systemd_unit: String,
    pub stop_timeout: Duration,
    pub start_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct TimelineSettings {
    pub page_size: NonZeroUsize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowGraphMode {
    /// Follow sets live in the cache engine's key space.
    Cache,
    /// Follow sets are owned by an external HTTP service.
    Remote,
}

impl FromStr for FollowGraphMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "cache" => Ok(Self::Cache),
            "remote" => Ok(Self::Remote),
            other => Err(format!("unknown mode `{other}`, expected cache or remote")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FollowGraphSettings {
    pub mode: FollowGraphMode,
    pub endpoint: Option<Url>,
}

#[derive(Debug, Clone, Copy)]
pub struct SeedSettings {
    pub post_cutoff: i64,
    pub user_cutoff: i64,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("WARBLER").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::BakeSeed(args)) | Some(Command::ResetToSeed(args)) => {
            raw.apply_maintenance_overrides(args)
        }
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    cache: RawCacheSettings,
    timeline: RawTimelineSettings,
    follow_graph: RawFollowGraphSettings,
    seed: RawSeedSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(size) = overrides.timeline_page_size {
            self.timeline.page_size = Some(size);
        }
        if let Some(mode) = overrides.follow_graph_mode.as_ref() {
            self.follow_graph.mode = Some(mode.clone());
        }
        if let Some(endpoint) = overrides.follow_graph_endpoint.as_ref() {
            self.follow_graph.endpoint = Some(endpoint.clone());
        }

        self.apply_database_override(&overrides.database);
        self.apply_cache_overrides(&overrides.cache);
    }

    fn apply_maintenance_overrides(&mut self, args: &MaintenanceArgs) {
        self.apply_database_override(&args.database);
        self.apply_cache_overrides(&args.cache);
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }

    fn apply_cache_overrides(&mut self, overrides: &CacheOverrides) {
        if let Some(engine) = overrides.cache_engine.as_ref() {
            self.cache.engine = Some(engine.clone());
        }
        if let Some(url) = overrides.cache_redis_url.as_ref() {
            self.cache.redis_url = Some(url.clone());
        }
        if let Some(path) = overrides.cache_live_snapshot.as_ref() {
            self.cache.live_snapshot = Some(path.clone());
        }
        if let Some(path) = overrides.cache_seed_snapshot.as_ref() {
            self.cache.seed_snapshot = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            cache,
            timeline,
            follow_graph,
            seed,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            database: build_database_settings(database)?,
            cache: build_cache_settings(cache)?,
            timeline: build_timeline_settings(timeline)?,
            follow_graph: build_follow_graph_settings(follow_graph)?,
            seed: build_seed_settings(seed)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = non_blank(database.url);
    let max_connections = non_zero_u32(
        database
            .max_connections
            .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS)
            .into(),
        "database.max_connections",
    )?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_cache_settings(cache: RawCacheSettings) -> Result<CacheSettings, LoadError> {
    let engine = match non_blank(cache.engine) {
        Some(value) => EngineKind::from_str(&value)
            .map_err(|reason| LoadError::invalid("cache.engine", reason))?,
        None => EngineKind::Redis,
    };

    let redis_url = non_blank(cache.redis_url).unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
    if engine == EngineKind::Redis {
        Url::parse(&redis_url)
            .map_err(|err| LoadError::invalid("cache.redis_url", err.to_string()))?;
    }

    let live_snapshot = non_empty_path(
        cache.live_snapshot,
        DEFAULT_LIVE_SNAPSHOT,
        "cache.live_snapshot",
    )?;
    let seed_snapshot = non_empty_path(
        cache.seed_snapshot,
        DEFAULT_SEED_SNAPSHOT,
        "cache.seed_snapshot",
    )?;
    if live_snapshot == seed_snapshot {
        return Err(LoadError::invalid(
            "cache.seed_snapshot",
            "seed and live snapshots must be different files",
        ));
    }

    let systemd_unit =
        non_blank(cache.systemd_unit).unwrap_or_else(|| DEFAULT_SYSTEMD_UNIT.to_string());

    let stop_timeout = positive_millis(
        cache.stop_timeout_ms.unwrap_or(DEFAULT_STOP_TIMEOUT_MS),
        "cache.stop_timeout_ms",
    )?;
    let start_timeout = positive_millis(
        cache.start_timeout_ms.unwrap_or(DEFAULT_START_TIMEOUT_MS),
        "cache.start_timeout_ms",
    )?;

    Ok(CacheSettings {
        engine,
        redis_url,
        live_snapshot,
        seed_snapshot,
        systemd_unit,
        stop_timeout,
        start_timeout,
    })
}

fn build_timeline_settings(timeline: RawTimelineSettings) -> Result<TimelineSettings, LoadError> {
    let value = timeline.page_size.unwrap_or(DEFAULT_PAGE_SIZE as u64);
    let value = usize::try_from(value).map_err(|_| {
        LoadError::invalid(
            "timeline.page_size",
            "value exceeds supported range for usize",
        )
    })?;
    let page_size = NonZeroUsize::new(value)
        .ok_or_else(|| LoadError::invalid("timeline.page_size", "must be greater than zero"))?;

    Ok(TimelineSettings { page_size })
}

fn build_follow_graph_settings(
    follow_graph: RawFollowGraphSettings,
) -> Result<FollowGraphSettings, LoadError> {
    let mode = match non_blank(follow_graph.mode) {
        Some(value) => FollowGraphMode::from_str(&value)
            .map_err(|reason| LoadError::invalid("follow_graph.mode", reason))?,
        None => FollowGraphMode::Cache,
    };

    let endpoint = non_blank(follow_graph.endpoint)
        .map(|value| {
            Url::parse(&value)
                .map_err(|err| LoadError::invalid("follow_graph.endpoint", err.to_string()))
        })
        .transpose()?;

    if mode == FollowGraphMode::Remote && endpoint.is_none() {
        return Err(LoadError::invalid(
            "follow_graph.endpoint",
            "required when follow_graph.mode is remote",
        ));
    }

    Ok(FollowGraphSettings { mode, endpoint })
}

fn build_seed_settings(seed: RawSeedSettings) -> Result<SeedSettings, LoadError> {
    let post_cutoff = seed.post_cutoff.unwrap_or(DEFAULT_POST_CUTOFF);
    if post_cutoff < 0 {
        return Err(LoadError::invalid("seed.post_cutoff", "must not be negative"));
    }
    let user_cutoff = seed.user_cutoff.unwrap_or(DEFAULT_USER_CUTOFF);
    if user_cutoff < 0 {
        return Err(LoadError::invalid("seed.user_cutoff", "must not be negative"));
    }

    Ok(SeedSettings {
        post_cutoff,
        user_cutoff,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCacheSettings {
    engine: Option<String>,
    redis_url: Option<String>,
    live_snapshot: Option<PathBuf>,
    seed_snapshot: Option<PathBuf>,
    systemd_unit: Option<String>,
    stop_timeout_ms: Option<u64>,
    start_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawTimelineSettings {
    page_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFollowGraphSettings {
    mode: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSeedSettings {
    post_cutoff: Option<i64>,
    user_cutoff: Option<i64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn non_empty_path(
    value: Option<PathBuf>,
    default: &str,
    key: &'static str,
) -> Result<PathBuf, LoadError> {
    let path = value.unwrap_or_else(|| PathBuf::from(default));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid(key, "path must not be empty"));
    }
    Ok(path)
}

fn positive_millis(value: u64, key: &'static str) -> Result<Duration, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    Ok(Duration::from_millis(value))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}
