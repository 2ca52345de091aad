//! Dispatcher - main loop for fan-out to sinks

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{ClassificationResult, SinkConfig, SinkType};

use crate::error::DispatcherError;
use crate::handle::{SinkHandle, DEFAULT_FLUSH_INTERVAL};
use crate::metrics::MetricsSnapshot;
use crate::sinks::{JsonLinesSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Sink configurations
    pub sinks: Vec<SinkConfig>,
}

/// Builder for creating a Dispatcher
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<ClassificationResult>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<ClassificationResult>) -> Self {
        Self { config, input_rx }
    }

    /// Create every sink and start its worker
    ///
    /// Must be called from within a tokio runtime.
    #[instrument(name = "dispatcher_builder_build", skip(self), fields(sink_count = self.config.sinks.len()))]
    pub fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = self
            .config
            .sinks
            .iter()
            .map(create_sink_handle)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Dispatcher {
            handles,
            input_rx: self.input_rx,
        })
    }
}

/// Create a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
fn create_sink_handle(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let flush_interval = flush_interval(config)?;
    let handle = match config.sink_type {
        SinkType::Log => SinkHandle::with_flush_interval(
            LogSink::new(&config.name),
            config.queue_capacity,
            flush_interval,
        ),
        SinkType::JsonLines => {
            let sink = JsonLinesSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::with_flush_interval(sink, config.queue_capacity, flush_interval)
        }
    };
    Ok(handle)
}

/// `params.flush_interval_ms`, or the default
fn flush_interval(config: &SinkConfig) -> Result<Duration, DispatcherError> {
    match config.params.get("flush_interval_ms") {
        None => Ok(DEFAULT_FLUSH_INTERVAL),
        Some(raw) => raw
            .parse::<u64>()
            .ok()
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .ok_or_else(|| {
                DispatcherError::sink_creation(
                    &config.name,
                    format!("flush_interval_ms must be a positive integer, got {raw:?}"),
                )
            }),
    }
}

/// Fans classification results out to sinks
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<ClassificationResult>,
}

impl Dispatcher {
    /// Create a dispatcher with custom sink handles
    pub fn with_handles(
        handles: Vec<SinkHandle>,
        input_rx: mpsc::Receiver<ClassificationResult>,
    ) -> Self {
        Self { handles, input_rx }
    }

    pub fn sink_count(&self) -> usize {
        self.handles.len()
    }

    /// Get metrics for all sinks
    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Run the dispatcher main loop
    ///
    /// Returns the final per-sink metrics once the input channel is closed
    /// and every sink has been flushed.
    #[instrument(name = "dispatcher_run", skip(self))]
    pub async fn run(mut self) -> Vec<(String, MetricsSnapshot)> {
        info!(sinks = self.handles.len(), "Dispatcher started");
        if self.handles.is_empty() {
            warn!("No sinks configured - results are only counted");
        }

        let mut result_count: u64 = 0;

        while let Some(result) = self.input_rx.recv().await {
            result_count += 1;
            self.dispatch(&result);

            if result_count.is_multiple_of(100) {
                debug!(results = result_count, "Dispatcher progress");
            }
        }

        info!(results = result_count, "Dispatcher input closed, shutting down");

        let sink_metrics: Vec<_> = self
            .handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect();
        for handle in self.handles {
            handle.shutdown().await;
        }

        info!("Dispatcher shutdown complete");
        sink_metrics
            .into_iter()
            .map(|(name, metrics)| (name, metrics.snapshot()))
            .collect()
    }

    /// Spawn the dispatcher as a background task
    pub fn spawn(self) -> JoinHandle<Vec<(String, MetricsSnapshot)>> {
        tokio::spawn(self.run())
    }

    fn dispatch(&self, result: &ClassificationResult) {
        for handle in &self.handles {
            handle.try_send(result.clone());
        }
    }
}

/// Convenience function to create a dispatcher from sink configs
#[instrument(name = "dispatcher_create", skip(sink_configs, input_rx))]
pub fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<ClassificationResult>,
) -> Result<Dispatcher, DispatcherError> {
    let config = DispatcherConfig {
        sinks: sink_configs,
    };
    DispatcherBuilder::new(config, input_rx).build()
}
