//! Recognition orchestrator
//!
//! Single-writer owner of all per-stream state. Each raw sample runs through
//! validation and windowing; every window the sample completes is turned into
//! a feature vector and classified before the call returns.
//!
//! ```text
//! RawSample ─▶ SampleValidator ─▶ WindowingEngine ─▶ FeatureExtractor ─▶ ClassifierAdapter
//!                 │ rejection          │ gap                │ too short           │ schema mismatch
//!                 ▼                    ▼                    ▼                     ▼
//!           samples_rejected       gap_events         windows_dropped      stream unhealthy
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use classifier::{ClassifierAdapter, ClassifierError, ModelHandle, ModelSnapshot};
use contracts::{
    ActivityLabel, ClassificationResult, FeatureConfig, RawSample, RecognitionBlueprint,
    RejectionReason, StreamId, ValidatorConfig, Window, WindowConfig,
};
use features::FeatureExtractor;
use ingestion::SampleValidator;
use observability::{metrics, CounterRegistry, CounterSnapshot, StreamCounters};
use tracing::{debug, info, instrument, trace, warn};
use windowing::WindowingEngine;

use crate::error::StreamFault;

/// Pipeline settings of one orchestrator
#[derive(Debug, Clone, Default)]
pub struct OrchestratorConfig {
    pub validator: ValidatorConfig,
    pub window: WindowConfig,
    pub features: FeatureConfig,
    pub confidence_threshold: f64,
}

impl OrchestratorConfig {
    pub fn from_blueprint(blueprint: &RecognitionBlueprint) -> Self {
        Self {
            validator: blueprint.validator.clone(),
            window: blueprint.window.clone(),
            features: blueprint.features.clone(),
            confidence_threshold: blueprint.classifier.confidence_threshold,
        }
    }
}

/// State the orchestrator keeps per stream
///
/// Window buffers live in the [`WindowingEngine`] under the same key.
#[derive(Debug)]
struct StreamState {
    last_accepted_us: Option<i64>,
    healthy: bool,
    counters: Arc<StreamCounters>,
    last_activity: Instant,
    /// Gap events already copied into the counters
    gaps_recorded: u64,
}

impl StreamState {
    fn new(counters: Arc<StreamCounters>) -> Self {
        Self {
            last_accepted_us: None,
            healthy: true,
            counters,
            last_activity: Instant::now(),
            gaps_recorded: 0,
        }
    }
}

/// Per-stream recognition pipeline
#[derive(Debug)]
pub struct RecognitionOrchestrator {
    validator: SampleValidator,
    windowing: WindowingEngine,
    extractor: FeatureExtractor,
    classifier: ClassifierAdapter,
    /// Refreshed once per batch of windows
    model: ModelSnapshot,
    registry: Arc<CounterRegistry>,
    streams: HashMap<StreamId, StreamState>,
}

impl RecognitionOrchestrator {
    /// Build the pipeline around a shared model.
    ///
    /// # Errors
    /// [`ClassifierError::SchemaMismatch`] if the model was trained on a
    /// different feature layout than the configured extractor produces.
    pub fn new(
        config: OrchestratorConfig,
        model: ModelHandle,
        registry: Arc<CounterRegistry>,
    ) -> Result<Self, ClassifierError> {
        let extractor = FeatureExtractor::new(&config.features);
        let snapshot = model.snapshot();
        snapshot.model().check_schema(&extractor.schema())?;

        Ok(Self {
            validator: SampleValidator::new(config.validator),
            windowing: WindowingEngine::new(config.window),
            extractor,
            classifier: ClassifierAdapter::new(model, config.confidence_threshold),
            model: snapshot,
            registry,
            streams: HashMap::new(),
        })
    }

    /// Process one raw sample.
    ///
    /// Returns the results of every window the sample completed (usually
    /// none or one). Rejected samples return `Ok(vec![])` and are counted.
    ///
    /// # Errors
    /// - [`StreamFault::SchemaMismatch`] when classification fails; the
    ///   stream is marked unhealthy and none of the windows completed by this
    ///   sample is classified
    /// - [`StreamFault::Unhealthy`] for every later sample of that stream
    pub fn ingest(&mut self, raw: RawSample) -> Result<Vec<ClassificationResult>, StreamFault> {
        let now_us = self
            .validator
            .config()
            .max_future_skew_ms
            .map(|_| wall_clock_us());
        self.ingest_at(raw, now_us)
    }

    /// Flat form of [`ingest`](Self::ingest).
    pub fn ingest_reading(
        &mut self,
        stream_id: impl Into<StreamId>,
        timestamp_us: i64,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<Vec<ClassificationResult>, StreamFault> {
        self.ingest(RawSample::new(stream_id, timestamp_us, x, y, z))
    }

    /// [`ingest`](Self::ingest) against an explicit clock (µs since epoch).
    #[instrument(
        level = "trace",
        name = "orchestrator_ingest",
        skip(self, raw),
        fields(stream_id = %raw.stream_id)
    )]
    pub fn ingest_at(
        &mut self,
        raw: RawSample,
        now_us: Option<i64>,
    ) -> Result<Vec<ClassificationResult>, StreamFault> {
        let stream_id = raw.stream_id.clone();
        let registry = &self.registry;
        let state = self.streams.entry(stream_id.clone()).or_insert_with(|| {
            debug!(stream_id = %stream_id, "stream opened");
            StreamState::new(registry.counters(&stream_id))
        });

        state.last_activity = Instant::now();
        state.counters.record_received();
        metrics::record_sample_received();

        if !state.healthy {
            state.counters.record_rejected(RejectionReason::StreamUnhealthy);
            metrics::record_sample_rejected(RejectionReason::StreamUnhealthy);
            return Err(StreamFault::Unhealthy { stream_id });
        }

        let sample = match self.validator.validate(&raw, state.last_accepted_us, now_us) {
            Ok(sample) => sample,
            Err(rejection) => {
                state.counters.record_rejected(rejection.reason);
                metrics::record_sample_rejected(rejection.reason);
                debug!(
                    stream_id = %stream_id,
                    reason = %rejection.reason,
                    detail = %rejection.detail,
                    "sample rejected"
                );
                return Ok(Vec::new());
            }
        };

        state.last_accepted_us = Some(sample.timestamp_us);
        state.counters.record_accepted();
        metrics::record_sample_accepted();

        let windows = self.windowing.push(sample);
        self.process_windows(&stream_id, windows)
    }

    /// Flush and classify the in-flight window, then drop all stream state.
    ///
    /// Counters survive in the registry. Closing an unknown stream is a no-op.
    ///
    /// # Errors
    /// [`StreamFault::Unhealthy`] if the stream had been disabled; its state
    /// is discarded all the same.
    #[instrument(name = "orchestrator_close_stream", skip(self, stream_id), fields(stream_id = %stream_id))]
    pub fn close_stream(
        &mut self,
        stream_id: &StreamId,
    ) -> Result<Vec<ClassificationResult>, StreamFault> {
        let Some(healthy) = self.streams.get(stream_id).map(|s| s.healthy) else {
            self.windowing.remove(stream_id);
            return Ok(Vec::new());
        };

        let outcome = if healthy {
            let tail: Vec<Window> = self.windowing.flush(stream_id).into_iter().collect();
            self.process_windows(stream_id, tail)
        } else {
            Err(StreamFault::Unhealthy {
                stream_id: stream_id.clone(),
            })
        };

        let stats = self.windowing.remove(stream_id).unwrap_or_default();
        self.streams.remove(stream_id);
        info!(
            stream_id = %stream_id,
            windows = stats.windows_emitted,
            gaps = stats.gap_events,
            interpolated = stats.samples_interpolated,
            healthy,
            "stream closed"
        );

        outcome
    }

    /// Close every stream without activity since `now - timeout`.
    ///
    /// Returns the final results of each evicted stream, ordered by stream id.
    pub fn evict_idle(
        &mut self,
        now: Instant,
        timeout: Duration,
    ) -> Vec<(StreamId, Vec<ClassificationResult>)> {
        let mut idle: Vec<StreamId> = self
            .streams
            .iter()
            .filter(|(_, state)| now.saturating_duration_since(state.last_activity) >= timeout)
            .map(|(id, _)| id.clone())
            .collect();
        idle.sort();

        idle.into_iter()
            .map(|stream_id| {
                debug!(stream_id = %stream_id, timeout_s = timeout.as_secs(), "evicting idle stream");
                let results = self.close_stream(&stream_id).unwrap_or_else(|fault| {
                    warn!(error = %fault, "idle stream closed with fault");
                    Vec::new()
                });
                (stream_id, results)
            })
            .collect()
    }

    /// Close every open stream, ordered by stream id.
    pub fn close_all(&mut self) -> Vec<(StreamId, Result<Vec<ClassificationResult>, StreamFault>)> {
        let mut ids = self.stream_ids();
        ids.sort();
        ids.into_iter()
            .map(|stream_id| {
                let outcome = self.close_stream(&stream_id);
                (stream_id, outcome)
            })
            .collect()
    }

    /// Counter snapshot of a stream (kept after the stream is closed).
    pub fn counters(&self, stream_id: &StreamId) -> Option<CounterSnapshot> {
        self.registry.snapshot(stream_id)
    }

    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    pub fn is_healthy(&self, stream_id: &StreamId) -> Option<bool> {
        self.streams.get(stream_id).map(|s| s.healthy)
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.streams.keys().cloned().collect()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn model(&self) -> &ModelHandle {
        self.classifier.model()
    }

    fn process_windows(
        &mut self,
        stream_id: &StreamId,
        windows: Vec<Window>,
    ) -> Result<Vec<ClassificationResult>, StreamFault> {
        // One model for the whole batch: every vector is checked before any
        // result is recorded, so a mismatch classifies nothing.
        self.classifier.model().refresh(&mut self.model);
        let model = self.model.model().clone();

        let gap_events = self
            .windowing
            .stats(stream_id)
            .map_or(0, |stats| stats.gap_events);
        let Some(state) = self.streams.get_mut(stream_id) else {
            return Ok(Vec::new());
        };
        state
            .counters
            .record_gaps(gap_events.saturating_sub(state.gaps_recorded));
        state.gaps_recorded = state.gaps_recorded.max(gap_events);

        let mut extracted = Vec::with_capacity(windows.len());
        for window in windows {
            let started = Instant::now();
            state.counters.record_window(window.quality.is_complete());
            metrics::record_window_emitted(window.quality);

            match self.extractor.extract(&window) {
                Ok(features) => extracted.push((features, started)),
                Err(err) => {
                    state.counters.record_window_dropped();
                    metrics::record_window_dropped();
                    debug!(
                        stream_id = %stream_id,
                        start_us = window.start_us,
                        close_reason = ?window.close_reason,
                        error = %err,
                        "window dropped"
                    );
                }
            }
        }

        if let Some(source) = extracted
            .iter()
            .find_map(|(features, _)| model.check_input(features).err())
        {
            state.healthy = false;
            warn!(
                stream_id = %stream_id,
                error = %source,
                windows = extracted.len(),
                "classification failed, stream marked unhealthy"
            );
            return Err(StreamFault::SchemaMismatch {
                stream_id: stream_id.clone(),
                source,
            });
        }

        let mut results = Vec::with_capacity(extracted.len());
        for (features, started) in extracted {
            let result = self
                .classifier
                .classify_with(&model, &features)
                .map_err(|source| StreamFault::SchemaMismatch {
                    stream_id: stream_id.clone(),
                    source,
                })?;
            state
                .counters
                .record_result(result.predicted_label == ActivityLabel::Unknown);
            metrics::record_result(&result);
            metrics::record_window_latency_ms(started.elapsed().as_secs_f64() * 1000.0);
            trace!(
                stream_id = %stream_id,
                start_us = result.start_us,
                label = %result.predicted_label,
                confidence = result.confidence,
                quality = result.quality.as_str(),
                "result"
            );
            results.push(result);
        }

        Ok(results)
    }
}

fn wall_clock_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_micros() as i64)
}
