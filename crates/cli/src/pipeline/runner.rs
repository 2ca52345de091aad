//! Pipeline runner - wires ingestion, recognition and dispatch together.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::{ClassificationResult, RecognitionBlueprint, StreamId};
use ingestion::IngestionPipeline;
use observability::{CounterRegistry, RecognitionMetricsAggregator};
use recognition::{OrchestratorConfig, RecognitionService, ServiceError};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::setup::{build_sources, load_model, InputSource};
use super::PipelineStats;

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The validated configuration
    pub blueprint: RecognitionBlueprint,

    /// Where samples come from
    pub input: InputSource,

    /// Maximum number of results to produce (None = unlimited)
    pub max_results: Option<u64>,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Channel buffer size
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Keep every result to summarise activity per stream at the end
    pub activity_summary: bool,
}

/// Everything that happens to a result once it leaves the recognition service
struct ResultCollector {
    dispatch_tx: mpsc::Sender<ClassificationResult>,
    aggregator: RecognitionMetricsAggregator,
    emitted: u64,
    per_stream: Option<BTreeMap<StreamId, Vec<ClassificationResult>>>,
}

impl ResultCollector {
    /// Returns false once the dispatcher is gone.
    async fn accept(&mut self, result: ClassificationResult) -> bool {
        self.emitted += 1;
        self.aggregator.update(&result);
        if let Some(per_stream) = self.per_stream.as_mut() {
            per_stream
                .entry(result.stream_id.clone())
                .or_default()
                .push(result.clone());
        }

        if self.dispatch_tx.send(result).await.is_err() {
            warn!("Dispatcher channel closed");
            return false;
        }
        true
    }
}

/// Main pipeline runner
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run the pipeline until the input is exhausted, a limit is hit or the
    /// timeout expires
    pub async fn run(self) -> Result<PipelineStats> {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;

        // Metrics endpoint (optional)
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let model = load_model(blueprint).context("Failed to load model")?;

        // Ingestion
        info!("Setting up ingestion pipeline...");
        let sources = build_sources(&self.config.input, blueprint)
            .context("Failed to set up sample sources")?;
        let mut ingestion = IngestionPipeline::new(self.config.buffer_size);
        for source in sources {
            ingestion.register_source(source, None)?;
        }
        let active_streams = ingestion.source_count();
        info!(active_streams, "Ingestion pipeline configured");

        // Dispatcher
        let (dispatch_tx, dispatch_rx) = mpsc::channel(self.config.buffer_size);
        if blueprint.sinks.is_empty() {
            warn!("No sinks configured - results are only counted");
        }
        let dispatcher = dispatcher::create_dispatcher(blueprint.sinks.clone(), dispatch_rx)
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();

        // Recognition service; idle evictions arrive on `evicted_rx`
        let registry = Arc::new(CounterRegistry::new());
        let (evicted_tx, mut evicted_rx) = mpsc::channel(self.config.buffer_size);
        let service = RecognitionService::spawn(
            &blueprint.service,
            OrchestratorConfig::from_blueprint(blueprint),
            model,
            registry.clone(),
            Some(evicted_tx),
        )
        .context("Failed to start recognition service")?;

        let mut collector = ResultCollector {
            dispatch_tx,
            aggregator: RecognitionMetricsAggregator::new(),
            emitted: 0,
            per_stream: self.config.activity_summary.then(BTreeMap::new),
        };
        let mut stream_faults = 0u64;
        let mut samples_received = 0u64;

        info!("Starting sample ingestion...");
        let ingestion_rx = ingestion
            .take_receiver()
            .context("Failed to get ingestion receiver")?;
        ingestion.start_all()?;

        let max_results = self.config.max_results;
        info!(max_results = ?max_results, "Pipeline running");

        let processing = async {
            loop {
                tokio::select! {
                    sample = ingestion_rx.recv() => {
                        let Ok(sample) = sample else {
                            info!("All sample sources finished");
                            break;
                        };
                        samples_received += 1;

                        match service.ingest(sample).await {
                            Ok(results) => {
                                for result in results {
                                    if !collector.accept(result).await {
                                        return;
                                    }
                                }
                            }
                            Err(ServiceError::Fault(fault)) => {
                                stream_faults += 1;
                                debug!(stream_id = %fault.stream_id(), error = %fault, "Stream fault");
                            }
                            Err(ServiceError::Closed) => {
                                warn!("Recognition service closed");
                                break;
                            }
                        }
                    }
                    Some(result) = evicted_rx.recv() => {
                        if !collector.accept(result).await {
                            return;
                        }
                    }
                }

                if let Some(max) = max_results {
                    if collector.emitted >= max {
                        info!(results = collector.emitted, "Reached max results limit");
                        break;
                    }
                }
            }
        };

        // Run with optional timeout
        match self.config.timeout {
            Some(timeout) => {
                if tokio::time::timeout(timeout, processing).await.is_err() {
                    warn!(timeout_secs = timeout.as_secs(), "Pipeline timed out");
                }
            }
            None => processing.await,
        }

        // Shutdown: stop sources, flush every open stream, then drain the sinks
        info!("Shutting down pipeline...");
        ingestion.stop_all();
        let samples_dropped = ingestion.metrics().snapshot().samples_dropped;

        for result in service.shutdown().await {
            if !collector.accept(result).await {
                break;
            }
        }
        while let Ok(result) = evicted_rx.try_recv() {
            if !collector.accept(result).await {
                break;
            }
        }

        let ResultCollector {
            dispatch_tx,
            aggregator,
            emitted,
            per_stream,
        } = collector;
        drop(dispatch_tx);

        let sink_metrics = match tokio::time::timeout(Duration::from_secs(5), dispatcher_handle)
            .await
        {
            Ok(Ok(metrics)) => metrics,
            Ok(Err(e)) => {
                warn!(error = %e, "Dispatcher task failed");
                Vec::new()
            }
            Err(_) => {
                warn!("Dispatcher did not finish within 5s");
                Vec::new()
            }
        };

        let activity = per_stream
            .unwrap_or_default()
            .into_iter()
            .map(|(stream_id, results)| (stream_id, recognition::summarize(&results)))
            .collect();

        let stats = PipelineStats {
            samples_received,
            samples_dropped,
            results_emitted: emitted,
            stream_faults,
            duration: start_time.elapsed(),
            active_streams,
            recognition: aggregator,
            stream_counters: registry.all(),
            sink_metrics,
            activity,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            samples_per_sec = format!("{:.1}", stats.samples_per_sec()),
            results = stats.results_emitted,
            "Pipeline shutdown complete"
        );

        Ok(stats)
    }
}
