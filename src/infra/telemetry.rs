use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
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
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
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

/// Register metric descriptions with the installed recorder. Safe to call repeatedly.
pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "sitemaps_lastmod_hit_total",
            Unit::Count,
            "Lastmod reads answered from the option store."
        );
        describe_counter!(
            "sitemaps_lastmod_miss_total",
            Unit::Count,
            "Lastmod reads that found no usable value."
        );
        describe_counter!(
            "sitemaps_recompute_enqueued_total",
            Unit::Count,
            "Recompute jobs handed to the job runner."
        );
        describe_counter!(
            "sitemaps_recompute_suppressed_total",
            Unit::Count,
            "Recompute requests dropped because the page already had a pending job."
        );
        describe_counter!(
            "sitemaps_recompute_written_total",
            Unit::Count,
            "Recompute jobs that stored a new lastmod."
        );
        describe_counter!(
            "sitemaps_recompute_empty_total",
            Unit::Count,
            "Recompute jobs whose page had no items."
        );
        describe_counter!(
            "sitemaps_recompute_failed_total",
            Unit::Count,
            "Recompute jobs aborted by a catalog or store failure."
        );
        describe_histogram!(
            "sitemaps_sweep_ms",
            Unit::Milliseconds,
            "Refresh sweep fan-out latency in milliseconds."
        );
        describe_gauge!(
            "sitemaps_jobs_pending",
            Unit::Count,
            "Jobs currently scheduled or running in the job runner."
        );
    });
}
