//! # Observability
//!
//! Structured logs, the Prometheus endpoint and the per-stream counters the
//! recognition pipeline reports through.
//!
//! Every `activity_*` metric is recorded through [`metrics`]; [`describe`]
//! attaches units and help text once a recorder is installed.
//!
//! ```ignore
//! observability::init_with_config(ObservabilityConfig::default())?;
//! observability::init_metrics_only(9000)?;
//!
//! let registry = CounterRegistry::new();
//! registry.counters(&stream_id).record_received();
//! metrics::record_sample_received();
//! ```

mod counters;
pub mod metrics;

use anyhow::{Context, Result};
use ::metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::counters::{CounterRegistry, CounterSnapshot, StreamCounters};
pub use crate::metrics::{
    record_result, record_result_dispatched, record_result_dropped, record_sample_accepted,
    record_sample_received, record_sample_rejected, record_window_dropped, record_window_emitted,
    record_window_latency_ms, RecognitionMetricsAggregator, RecognitionSummary, RunningStats,
    StatsSummary,
};

/// Logging setup of one process
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub log_format: LogFormat,
    /// Prometheus port; `None` leaves the exporter to [`init_metrics_only`]
    pub metrics_port: Option<u16>,
    /// Filter used when `RUST_LOG` is not set
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with span fields (`stream_id`, `shard`)
    #[default]
    Json,
    Pretty,
    Compact,
}

/// Install the global tracing subscriber, and the exporter if a port is set.
///
/// # Errors
/// A subscriber or recorder is already installed, or the port is taken.
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.default_log_level));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );
    Ok(())
}

/// Serve Prometheus metrics on `0.0.0.0:port` (tracing set up elsewhere).
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;
    describe();

    tracing::info!(port, "Prometheus metrics endpoint initialized");
    Ok(())
}

/// Help text and units of the recognition metrics.
///
/// No-op without an installed recorder.
pub fn describe() {
    describe_counter!("activity_samples_received_total", "Raw samples offered to the pipeline");
    describe_counter!("activity_samples_accepted_total", "Samples that passed validation");
    describe_counter!(
        "activity_samples_rejected_total",
        "Samples rejected, labelled by reason"
    );
    describe_counter!(
        "activity_windows_emitted_total",
        "Windows closed, labelled by quality"
    );
    describe_counter!(
        "activity_windows_dropped_total",
        "Windows too short for feature extraction"
    );
    describe_counter!("activity_results_total", "Classification results, labelled by activity");
    describe_counter!(
        "activity_results_dropped_total",
        "Results discarded because the output consumer fell behind"
    );
    describe_counter!(
        "activity_results_dispatched_total",
        "Results handed to sinks, labelled by sink and status"
    );
    describe_counter!("activity_model_reloads_total", "Model reload attempts");
    describe_histogram!(
        "activity_window_processing_ms",
        Unit::Milliseconds,
        "Feature extraction and classification time per window"
    );
    describe_histogram!("activity_confidence", "Confidence of each result");
    describe_histogram!("activity_intensity", "Movement intensity of each result");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_leaves_exporter_off() {
        let config = ObservabilityConfig::default();
        assert_eq!(config.metrics_port, None);
        assert_eq!(config.default_log_level, "info");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_describe_without_recorder() {
        describe();
        crate::metrics::record_result_dropped();
    }
}
