use std::sync::Once;

use metrics::{Unit, describe_counter, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "warbler_home_cache_hit_total",
            Unit::Count,
            "Home timeline requests served from the cache."
        );
        describe_counter!(
            "warbler_home_cache_miss_total",
            Unit::Count,
            "Home timeline requests that had to compose the page."
        );
        describe_counter!(
            "warbler_home_cache_invalidate_total",
            Unit::Count,
            "Home timeline entries deleted by their owner's actions."
        );
        describe_counter!(
            "warbler_author_cache_read_total",
            Unit::Count,
            "Author timeline windows read from the cache."
        );
        describe_counter!(
            "warbler_hashtag_cache_read_total",
            Unit::Count,
            "Hashtag index windows read from the cache."
        );
        describe_counter!(
            "warbler_search_scan_rows_total",
            Unit::Count,
            "Record store rows examined by search scans."
        );
        describe_histogram!(
            "warbler_rebuild_ms",
            Unit::Milliseconds,
            "Reset-to-seed and bake-seed latency in milliseconds."
        );
    });
}
