//! Sharded recognition service
//!
//! Streams are partitioned over N shard workers by `hash(stream_id) % N`.
//! Each worker is a tokio task owning one [`RecognitionOrchestrator`], so
//! every stream has exactly one writer and its results come out in window
//! order. Shards share the model handle and the counter registry.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use classifier::{ClassifierError, ModelHandle};
use contracts::{ClassificationResult, RawSample, RejectionReason, ServiceConfig, StreamId};
use observability::{metrics, CounterRegistry};
use tokio::sync::mpsc::OwnedPermit;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{ServiceError, StreamFault};
use crate::orchestrator::{OrchestratorConfig, RecognitionOrchestrator};

type Reply = oneshot::Sender<Result<Vec<ClassificationResult>, StreamFault>>;

enum Command {
    /// Classify and answer the caller
    Ingest { sample: RawSample, reply: Reply },
    /// Classify and forward results to the output channel
    Submit(RawSample),
    Close { stream_id: StreamId, reply: Reply },
}

struct Shard {
    tx: mpsc::Sender<Command>,
    worker: JoinHandle<Vec<ClassificationResult>>,
}

/// Concurrent front of the pipeline
pub struct RecognitionService {
    shards: Vec<Shard>,
    registry: Arc<CounterRegistry>,
}

impl RecognitionService {
    /// Build one orchestrator per shard and start the workers.
    ///
    /// `output` receives the results of [`submit`](Self::submit)ted samples
    /// and of streams closed by idle eviction. Shards never wait on it: up
    /// to `queue_capacity` results per shard are held back while it is full,
    /// beyond that the oldest are dropped (`activity_results_dropped_total`).
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// The model does not fit the configured feature layout.
    #[instrument(name = "recognition_service_spawn", skip_all, fields(shards = config.shards))]
    pub fn spawn(
        config: &ServiceConfig,
        pipeline: OrchestratorConfig,
        model: ModelHandle,
        registry: Arc<CounterRegistry>,
        output: Option<mpsc::Sender<ClassificationResult>>,
    ) -> Result<Self, ClassifierError> {
        let shard_count = config.shards.max(1);
        let idle_timeout = Duration::from_secs(config.idle_timeout_s);
        let check_interval = Duration::from_millis(config.idle_check_interval_ms.max(1));

        let orchestrators = (0..shard_count)
            .map(|_| {
                RecognitionOrchestrator::new(pipeline.clone(), model.clone(), registry.clone())
            })
            .collect::<Result<Vec<_>, _>>()?;

        let shards = orchestrators
            .into_iter()
            .enumerate()
            .map(|(index, orchestrator)| {
                let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
                let worker = tokio::spawn(shard_worker(
                    index,
                    orchestrator,
                    rx,
                    Outbox::new(output.clone(), config.queue_capacity.max(1)),
                    idle_timeout,
                    check_interval,
                ));
                Shard { tx, worker }
            })
            .collect();

        info!(
            shards = shard_count,
            queue_capacity = config.queue_capacity,
            idle_timeout_s = config.idle_timeout_s,
            "recognition service started"
        );

        Ok(Self { shards, registry })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard that owns a stream.
    pub fn shard_for(&self, stream_id: &StreamId) -> usize {
        stream_id.shard(self.shards.len())
    }

    pub fn registry(&self) -> &Arc<CounterRegistry> {
        &self.registry
    }

    /// Process one sample and wait for its results.
    ///
    /// A full shard queue drops the sample (counted as `backpressure_drop`)
    /// and returns no results.
    pub async fn ingest(&self, sample: RawSample) -> Result<Vec<ClassificationResult>, ServiceError> {
        let (reply, response) = oneshot::channel();
        let stream_id = sample.stream_id.clone();
        let shard = &self.shards[self.shard_for(&stream_id)];

        match shard.tx.try_send(Command::Ingest { sample, reply }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_backpressure(&stream_id);
                return Ok(Vec::new());
            }
            Err(mpsc::error::TrySendError::Closed(_)) => return Err(ServiceError::Closed),
        }

        Ok(response.await.map_err(|_| ServiceError::Closed)??)
    }

    /// Flat form of [`ingest`](Self::ingest).
    pub async fn ingest_reading(
        &self,
        stream_id: impl Into<StreamId>,
        timestamp_us: i64,
        x: f64,
        y: f64,
        z: f64,
    ) -> Result<Vec<ClassificationResult>, ServiceError> {
        self.ingest(RawSample::new(stream_id, timestamp_us, x, y, z)).await
    }

    /// Queue a sample without waiting; results go to the output channel.
    ///
    /// Returns `Ok(false)` if the shard queue was full and the sample dropped.
    pub fn submit(&self, sample: RawSample) -> Result<bool, ServiceError> {
        let stream_id = sample.stream_id.clone();
        let shard = &self.shards[self.shard_for(&stream_id)];

        match shard.tx.try_send(Command::Submit(sample)) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.record_backpressure(&stream_id);
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(ServiceError::Closed),
        }
    }

    /// Flush a stream's in-flight window and drop its state.
    ///
    /// Waits for queue space: a close is never dropped.
    pub async fn close_stream(
        &self,
        stream_id: &StreamId,
    ) -> Result<Vec<ClassificationResult>, ServiceError> {
        let (reply, response) = oneshot::channel();
        let shard = &self.shards[self.shard_for(stream_id)];
        shard
            .tx
            .send(Command::Close {
                stream_id: stream_id.clone(),
                reply,
            })
            .await
            .map_err(|_| ServiceError::Closed)?;

        Ok(response.await.map_err(|_| ServiceError::Closed)??)
    }

    /// Close every stream and join the workers.
    ///
    /// Returns the results of the windows flushed at shutdown, preceded by
    /// any output still held back for a full output channel.
    #[instrument(name = "recognition_service_shutdown", skip(self))]
    pub async fn shutdown(self) -> Vec<ClassificationResult> {
        let mut results = Vec::new();
        for (index, shard) in self.shards.into_iter().enumerate() {
            drop(shard.tx);
            match shard.worker.await {
                Ok(flushed) => results.extend(flushed),
                Err(e) => error!(shard = index, error = ?e, "shard worker panicked"),
            }
        }
        info!(flushed = results.len(), "recognition service stopped");
        results
    }

    fn record_backpressure(&self, stream_id: &StreamId) {
        let counters = self.registry.counters(stream_id);
        counters.record_received();
        counters.record_rejected(RejectionReason::BackpressureDrop);
        metrics::record_sample_received();
        metrics::record_sample_rejected(RejectionReason::BackpressureDrop);
        trace!(stream_id = %stream_id, "shard queue full, sample dropped");
    }
}

/// Results waiting for room in the output channel
struct Outbox {
    output: Option<mpsc::Sender<ClassificationResult>>,
    pending: VecDeque<ClassificationResult>,
    capacity: usize,
}

impl Outbox {
    fn new(output: Option<mpsc::Sender<ClassificationResult>>, capacity: usize) -> Self {
        Self {
            output,
            pending: VecDeque::new(),
            capacity,
        }
    }

    fn is_waiting(&self) -> bool {
        self.output.is_some() && !self.pending.is_empty()
    }

    /// Hand results over without blocking; what does not fit is held back.
    fn push(&mut self, results: Vec<ClassificationResult>) {
        if self.output.is_none() || results.is_empty() {
            return;
        }
        self.pending.extend(results);
        self.flush();

        while self.pending.len() > self.capacity {
            if let Some(dropped) = self.pending.pop_front() {
                metrics::record_result_dropped();
                warn!(
                    stream_id = %dropped.stream_id,
                    start_us = dropped.start_us,
                    "output channel full, result dropped"
                );
            }
        }
    }

    fn flush(&mut self) {
        let Some(output) = self.output.as_ref() else {
            return;
        };
        let mut closed = false;
        while let Some(result) = self.pending.pop_front() {
            match output.try_send(result) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(result)) => {
                    self.pending.push_front(result);
                    break;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    closed = true;
                    break;
                }
            }
        }
        if closed {
            self.close();
        }
    }

    /// A slot opened up in the output channel.
    fn deliver(&mut self, permit: OwnedPermit<ClassificationResult>) {
        if let Some(result) = self.pending.pop_front() {
            permit.send(result);
        }
        self.flush();
    }

    fn close(&mut self) {
        warn!(discarded = self.pending.len(), "result output channel closed");
        self.output = None;
        self.pending.clear();
    }

    fn into_pending(mut self) -> Vec<ClassificationResult> {
        self.flush();
        self.pending.into()
    }
}

async fn reserve(
    output: Option<mpsc::Sender<ClassificationResult>>,
) -> Option<OwnedPermit<ClassificationResult>> {
    output?.reserve_owned().await.ok()
}

#[instrument(name = "recognition_shard_loop", skip_all, fields(shard = index))]
async fn shard_worker(
    index: usize,
    mut orchestrator: RecognitionOrchestrator,
    mut rx: mpsc::Receiver<Command>,
    mut outbox: Outbox,
    idle_timeout: Duration,
    check_interval: Duration,
) -> Vec<ClassificationResult> {
    debug!(shard = index, "shard worker started");

    let mut ticker = tokio::time::interval(check_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            command = rx.recv() => {
                let Some(command) = command else { break };
                match command {
                    Command::Ingest { sample, reply } => {
                        // The caller may have given up waiting.
                        let _ = reply.send(orchestrator.ingest(sample));
                    }
                    Command::Submit(sample) => match orchestrator.ingest(sample) {
                        Ok(results) => outbox.push(results),
                        Err(fault) => trace!(error = %fault, "submitted sample not classified"),
                    },
                    Command::Close { stream_id, reply } => {
                        let _ = reply.send(orchestrator.close_stream(&stream_id));
                    }
                }
            }
            _ = ticker.tick() => {
                for (stream_id, results) in orchestrator.evict_idle(Instant::now(), idle_timeout) {
                    debug!(shard = index, stream_id = %stream_id, results = results.len(), "idle stream evicted");
                    outbox.push(results);
                }
            }
            permit = reserve(outbox.output.clone()), if outbox.is_waiting() => match permit {
                Some(permit) => outbox.deliver(permit),
                None => outbox.close(),
            },
        }
    }

    let mut flushed = outbox.into_pending();
    if !flushed.is_empty() {
        debug!(shard = index, held_back = flushed.len(), "returning undelivered output");
    }
    for (stream_id, outcome) in orchestrator.close_all() {
        match outcome {
            Ok(results) => flushed.extend(results),
            Err(fault) => warn!(stream_id = %stream_id, error = %fault, "stream closed with fault"),
        }
    }

    debug!(shard = index, flushed = flushed.len(), "shard worker stopped");
    flushed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::tests::{config, model};
    use contracts::ActivityLabel;

    fn service_config(shards: usize, queue_capacity: usize) -> ServiceConfig {
        ServiceConfig {
            shards,
            queue_capacity,
            ..Default::default()
        }
    }

    fn spawn(
        service: &ServiceConfig,
        output: Option<mpsc::Sender<ClassificationResult>>,
    ) -> RecognitionService {
        RecognitionService::spawn(
            service,
            config(),
            model(),
            Arc::new(CounterRegistry::new()),
            output,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_routing_follows_stream_shard() {
        let service = spawn(&service_config(4, 8), None);
        assert_eq!(service.shard_count(), 4);
        let id: StreamId = "wrist-7".into();
        assert_eq!(service.shard_for(&id), id.shard(4));
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_ingest_returns_results() {
        let service = spawn(&service_config(4, 64), None);
        let mut results = Vec::new();
        for i in 0..256 {
            results.extend(
                service
                    .ingest_reading("wrist", i * 10_000, 0.0, 0.0, 9.8)
                    .await
                    .unwrap(),
            );
        }
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].predicted_label, ActivityLabel::Sitting);

        let registry = service.registry().clone();
        assert!(service.shutdown().await.is_empty());
        assert_eq!(registry.snapshot(&"wrist".into()).unwrap().samples_accepted, 256);
    }

    #[tokio::test]
    async fn test_close_stream_flushes() {
        let service = spawn(&service_config(2, 64), None);
        for i in 0..200 {
            service
                .ingest_reading("s", i * 10_000, 0.0, 0.0, 9.8)
                .await
                .unwrap();
        }
        let results = service.close_stream(&"s".into()).await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(!results[0].quality.is_complete());
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_queue_drops_with_backpressure() {
        let service = spawn(&service_config(1, 1), None);

        // The current-thread runtime does not poll the shard until we yield.
        let accepted = (0..10)
            .map(|i| service.submit(RawSample::new("s", i * 10_000, 0.0, 0.0, 9.8)).unwrap())
            .filter(|queued| *queued)
            .count();
        assert_eq!(accepted, 1);

        let registry = service.registry().clone();
        service.shutdown().await;
        let counters = registry.snapshot(&"s".into()).unwrap();
        assert_eq!(counters.samples_received, 10);
        assert_eq!(counters.samples_accepted, 1);
        assert_eq!(counters.rejected(RejectionReason::BackpressureDrop), 9);
    }

    #[tokio::test]
    async fn test_submitted_results_reach_output() {
        let (tx, mut rx) = mpsc::channel(16);
        let service = spawn(&service_config(2, 1024), Some(tx));
        for stream in ["a", "b"] {
            for i in 0..256 {
                while !service
                    .submit(RawSample::new(stream, i * 10_000, 0.0, 0.0, 9.8))
                    .unwrap()
                {
                    tokio::task::yield_now().await;
                }
            }
        }
        let mut seen = Vec::new();
        for _ in 0..2 {
            seen.push(rx.recv().await.unwrap().stream_id.to_string());
        }
        seen.sort();
        assert_eq!(seen, vec!["a", "b"]);
        service.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_flushes_open_streams() {
        let service = spawn(&service_config(3, 64), None);
        for stream in ["a", "b", "c"] {
            for i in 0..100 {
                service
                    .ingest_reading(stream, i * 10_000, 0.0, 0.0, 9.8)
                    .await
                    .unwrap();
            }
        }
        let flushed = service.shutdown().await;
        assert_eq!(flushed.len(), 3);
    }

    #[tokio::test]
    async fn test_idle_streams_are_evicted_to_output() {
        let (tx, mut rx) = mpsc::channel(16);
        let service = spawn(
            &ServiceConfig {
                shards: 1,
                queue_capacity: 64,
                idle_timeout_s: 1,
                idle_check_interval_ms: 20,
            },
            Some(tx),
        );
        for i in 0..200 {
            service
                .ingest_reading("idle", i * 10_000, 0.0, 0.0, 9.8)
                .await
                .unwrap();
        }

        let evicted = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(evicted.stream_id, "idle");
        assert!(!evicted.quality.is_complete());
        assert!(service.shutdown().await.is_empty());
    }

    fn result(stream: &str, start_us: i64) -> ClassificationResult {
        ClassificationResult {
            stream_id: stream.into(),
            start_us,
            end_us: start_us + 2_560_000,
            predicted_label: ActivityLabel::Sitting,
            raw_label: ActivityLabel::Sitting,
            confidence: 0.9,
            per_class_scores: Default::default(),
            quality: contracts::QualityFlag::Complete,
            model_version: "m".to_string(),
            intensity: 0.0,
        }
    }

    #[test]
    fn test_outbox_holds_back_then_drops_oldest() {
        let (tx, mut rx) = mpsc::channel(1);
        let mut outbox = Outbox::new(Some(tx), 2);
        outbox.push((0..5).map(|i| result("s", i)).collect());

        assert_eq!(rx.try_recv().unwrap().start_us, 0);
        assert!(rx.try_recv().is_err());
        let held: Vec<i64> = outbox.pending.iter().map(|r| r.start_us).collect();
        assert_eq!(held, vec![3, 4]);

        // room again: the oldest held result goes first
        outbox.flush();
        assert_eq!(rx.try_recv().unwrap().start_us, 3);
        assert!(outbox.into_pending().is_empty());
        assert_eq!(rx.try_recv().unwrap().start_us, 4);
    }

    #[test]
    fn test_outbox_forgets_a_closed_output() {
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        let mut outbox = Outbox::new(Some(tx), 8);
        outbox.push(vec![result("s", 0), result("s", 1)]);
        assert!(!outbox.is_waiting());
        assert!(outbox.into_pending().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_output_does_not_block_ingest() {
        // room for one result and nobody reading
        let (tx, mut rx) = mpsc::channel(1);
        let service = spawn(
            &ServiceConfig {
                shards: 1,
                queue_capacity: 64,
                idle_timeout_s: 1,
                idle_check_interval_ms: 50,
            },
            Some(tx),
        );
        for stream in ["a", "b", "c"] {
            for i in 0..200 {
                service
                    .ingest_reading(stream, i * 10_000, 0.0, 0.0, 9.8)
                    .await
                    .unwrap();
            }
        }
        // all three streams go idle; only one eviction result fits the channel
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let reply = tokio::time::timeout(
            Duration::from_secs(3),
            service.ingest_reading("d", 0, 0.0, 0.0, 9.8),
        )
        .await
        .expect("shard stuck on a full output channel");
        assert!(reply.unwrap().is_empty());

        let flushed = tokio::time::timeout(Duration::from_secs(3), service.shutdown())
            .await
            .expect("shutdown stuck on a full output channel");
        assert_eq!(flushed.len(), 2);
        assert!(flushed.iter().all(|r| !r.quality.is_complete()));
        assert_eq!(rx.try_recv().unwrap().stream_id, "a");
    }

    #[tokio::test]
    async fn test_closed_service_reports_closed() {
        let (tx, rx) = mpsc::channel::<Command>(1);
        drop(rx);
        let service = RecognitionService {
            shards: vec![Shard {
                tx,
                worker: tokio::spawn(async { Vec::new() }),
            }],
            registry: Arc::new(CounterRegistry::new()),
        };
        assert!(matches!(
            service.ingest_reading("s", 0, 0.0, 0.0, 9.8).await,
            Err(ServiceError::Closed)
        ));
        assert!(matches!(
            service.submit(RawSample::new("s", 0, 0.0, 0.0, 9.8)),
            Err(ServiceError::Closed)
        ));
    }
}
