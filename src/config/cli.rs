use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};

/// Command-line arguments for the Warbler binary.
#[derive(Debug, Parser)]
#[command(name = "warbler", version, about = "Warbler micro-blogging server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "WARBLER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP service.
    Serve(Box<ServeArgs>),
    /// Rebuild every derived cache from the record store and capture it as the seed image.
    #[command(name = "bake-seed")]
    BakeSeed(MaintenanceArgs),
    /// Truncate the record store to the seed boundary and restore the seed image.
    #[command(name = "reset-to-seed")]
    ResetToSeed(MaintenanceArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct CacheOverrides {
    /// Override the cache engine (redis|memory).
    #[arg(long = "cache-engine", value_name = "ENGINE")]
    pub cache_engine: Option<String>,

    /// Override the Redis connection URL.
    #[arg(long = "cache-redis-url", value_name = "URL")]
    pub cache_redis_url: Option<String>,

    /// Override the live snapshot path.
    #[arg(long = "cache-live-snapshot", value_name = "PATH")]
    pub cache_live_snapshot: Option<PathBuf>,

    /// Override the seed snapshot path.
    #[arg(long = "cache-seed-snapshot", value_name = "PATH")]
    pub cache_seed_snapshot: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct MaintenanceArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub cache: CacheOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub database: DatabaseOverride,

    #[command(flatten)]
    pub cache: CacheOverrides,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Override the number of posts per timeline page.
    #[arg(long = "timeline-page-size", value_name = "COUNT")]
    pub timeline_page_size: Option<u64>,

    /// Override where the follow graph lives (cache|remote).
    #[arg(long = "follow-graph-mode", value_name = "MODE")]
    pub follow_graph_mode: Option<String>,

    /// Override the remote follow service endpoint.
    #[arg(long = "follow-graph-endpoint", value_name = "URL")]
    pub follow_graph_endpoint: Option<String>,
}
