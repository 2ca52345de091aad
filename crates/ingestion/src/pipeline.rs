//! Ingestion pipeline: fan-in of many sample sources into one channel

use std::collections::HashMap;
use std::sync::Arc;

use async_channel::{bounded, Receiver, Sender};
use contracts::{RawSample, SampleSource, StreamId};
use tracing::{debug, info, instrument, warn};

use crate::config::{BackpressureConfig, IngestionMetrics};
use crate::error::{IngestionError, Result};
use crate::source_adapter::SourceAdapter;

/// Ingestion Pipeline
///
/// Owns the registered sources and the bounded fan-in channel. The channel
/// closes once the pipeline has been started and every source has finished
/// and released its sender, so consumers see end-of-input for finite sources.
pub struct IngestionPipeline {
    adapters: HashMap<StreamId, SourceAdapter>,
    metrics: Arc<IngestionMetrics>,
    tx: Option<Sender<RawSample>>,
    rx: Option<Receiver<RawSample>>,
    default_config: BackpressureConfig,
}

impl IngestionPipeline {
    pub fn new(channel_capacity: usize) -> Self {
        Self::with_config(BackpressureConfig {
            channel_capacity,
            ..Default::default()
        })
    }

    pub fn with_config(config: BackpressureConfig) -> Self {
        let (tx, rx) = bounded(config.channel_capacity.max(1));
        Self {
            adapters: HashMap::new(),
            metrics: Arc::new(IngestionMetrics::new()),
            tx: Some(tx),
            rx: Some(rx),
            default_config: config,
        }
    }

    /// Register a sample source.
    ///
    /// # Errors
    /// A source for the same stream is already registered.
    #[instrument(
        name = "ingestion_register_source",
        skip(self, source, config),
        fields(stream_id = %source.stream_id())
    )]
    pub fn register_source(
        &mut self,
        source: Box<dyn SampleSource>,
        config: Option<BackpressureConfig>,
    ) -> Result<()> {
        let stream_id = source.stream_id().clone();
        if self.adapters.contains_key(&stream_id) {
            return Err(IngestionError::DuplicateStream { stream_id });
        }
        let adapter = SourceAdapter::new(
            source,
            config.unwrap_or_else(|| self.default_config.clone()),
        );
        debug!(stream_id = %stream_id, "registered sample source");
        self.adapters.insert(stream_id, adapter);
        Ok(())
    }

    /// Start every registered source.
    ///
    /// The pipeline's own sender is released here; a pipeline is started once.
    #[instrument(name = "ingestion_start_all", skip(self))]
    pub fn start_all(&mut self) -> Result<()> {
        let tx = self.tx.take().ok_or(IngestionError::AlreadyStarted)?;
        info!(count = self.adapters.len(), "starting all sample sources");
        for adapter in self.adapters.values() {
            adapter.start(tx.clone(), self.metrics.clone());
        }
        Ok(())
    }

    #[instrument(name = "ingestion_stop_all", skip(self))]
    pub fn stop_all(&self) {
        info!(count = self.adapters.len(), "stopping all sample sources");
        for (stream_id, adapter) in &self.adapters {
            if adapter.is_listening() {
                debug!(stream_id = %stream_id, "stopping source");
                adapter.stop();
            }
        }
        if self.metrics.snapshot().samples_dropped > 0 {
            warn!(
                dropped = self.metrics.snapshot().samples_dropped,
                "samples were dropped at ingestion"
            );
        }
    }

    /// Take the receiving end. Only the first call returns `Some`.
    pub fn take_receiver(&mut self) -> Option<Receiver<RawSample>> {
        self.rx.take()
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    pub fn source_count(&self) -> usize {
        self.adapters.len()
    }

    /// True when every registered source is finite and has finished.
    pub fn all_exhausted(&self) -> bool {
        self.adapters.values().all(|a| a.is_exhausted())
    }
}

impl Drop for IngestionPipeline {
    fn drop(&mut self) {
        self.stop_all();
    }
}
