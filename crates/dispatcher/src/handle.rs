//! SinkHandle - one sink behind its own bounded queue and worker task
//!
//! A slow or failing sink only ever loses its own results: `try_send` never
//! waits, and write errors are counted instead of stopping the worker.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, instrument, warn};

use contracts::{ClassificationResult, ResultSink};

use crate::metrics::SinkMetrics;

/// How often a worker flushes a sink that has unflushed writes
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Handle to a running sink worker
pub struct SinkHandle {
    name: String,
    tx: mpsc::Sender<ClassificationResult>,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Start a worker with the default flush interval
    pub fn spawn<S: ResultSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self::with_flush_interval(sink, queue_capacity, DEFAULT_FLUSH_INTERVAL)
    }

    /// Start a worker that flushes at most every `flush_interval` while results keep arriving
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_flush_interval<S: ResultSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        flush_interval: Duration,
    ) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(sink_worker(
            sink,
            rx,
            Arc::clone(&metrics),
            name.clone(),
            flush_interval.max(Duration::from_millis(1)),
        ));

        Self {
            name,
            tx,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a result without waiting
    ///
    /// Returns false when the result was dropped (queue full or worker gone).
    pub fn try_send(&self, result: ClassificationResult) -> bool {
        match self.tx.try_send(result) {
            Ok(()) => {
                self.metrics
                    .set_queue_len(self.tx.max_capacity() - self.tx.capacity());
                return true;
            }
            Err(mpsc::error::TrySendError::Full(r)) => warn!(
                sink = %self.name,
                stream_id = %r.stream_id,
                start_us = r.start_us,
                "Queue full, result dropped"
            ),
            Err(mpsc::error::TrySendError::Closed(r)) => {
                error!(sink = %self.name, stream_id = %r.stream_id, "Sink worker is gone")
            }
        }
        self.metrics.inc_dropped_count();
        observability::record_result_dispatched(&self.name, false);
        false
    }

    /// Close the queue and wait until the worker has drained, flushed and closed the sink
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

#[instrument(name = "sink_worker_loop", skip(sink, rx, metrics, flush_interval), fields(sink = %name))]
async fn sink_worker<S: ResultSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<ClassificationResult>,
    metrics: Arc<SinkMetrics>,
    name: String,
    flush_interval: Duration,
) {
    debug!("Sink worker started");

    let mut ticker = interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut unflushed = 0u64;

    loop {
        tokio::select! {
            received = rx.recv() => {
                let Some(result) = received else { break };
                metrics.set_queue_len(rx.len());
                match sink.write(&result).await {
                    Ok(()) => {
                        metrics.inc_write_count();
                        observability::record_result_dispatched(&name, true);
                        unflushed += 1;
                    }
                    Err(e) => {
                        metrics.inc_failure_count();
                        observability::record_result_dispatched(&name, false);
                        error!(stream_id = %result.stream_id, error = %e, "Write failed");
                    }
                }
            }
            _ = ticker.tick(), if unflushed > 0 => {
                match sink.flush().await {
                    Ok(()) => unflushed = 0,
                    Err(e) => warn!(pending = unflushed, error = %e, "Periodic flush failed"),
                }
            }
        }
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Close failed on shutdown");
    }

    debug!("Sink worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::json_lines::tests::sample_result;
    use contracts::ContractError;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::{sleep, Duration};

    /// Mock sink for testing
    struct MockSink {
        name: String,
        write_count: Arc<AtomicU64>,
        should_fail: bool,
        delay_ms: u64,
    }

    impl ResultSink for MockSink {
        fn name(&self) -> &str {
            &self.name
        }

        async fn write(&mut self, _result: &ClassificationResult) -> Result<(), ContractError> {
            if self.delay_ms > 0 {
                sleep(Duration::from_millis(self.delay_ms)).await;
            }
            if self.should_fail {
                return Err(ContractError::sink_write(&self.name, "mock failure"));
            }
            self.write_count.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    fn mock(name: &str, should_fail: bool, delay_ms: u64) -> (MockSink, Arc<AtomicU64>) {
        let write_count = Arc::new(AtomicU64::new(0));
        let sink = MockSink {
            name: name.to_string(),
            write_count: Arc::clone(&write_count),
            should_fail,
            delay_ms,
        };
        (sink, write_count)
    }

    #[tokio::test]
    async fn test_sink_handle_basic() {
        let (sink, write_count) = mock("test", false, 0);
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..5 {
            assert!(handle.try_send(sample_result("s", i * 1_280_000)));
        }

        handle.shutdown().await;
        assert_eq!(write_count.load(Ordering::Relaxed), 5);
    }

    #[tokio::test]
    async fn test_sink_handle_queue_full() {
        let (sink, _) = mock("slow", false, 100);
        let handle = SinkHandle::spawn(sink, 2);

        for i in 0..10 {
            handle.try_send(sample_result("s", i));
        }

        assert!(handle.metrics().dropped_count() > 0);
        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_sink_handle_failure_isolation() {
        let (sink, _) = mock("failing", true, 0);
        let handle = SinkHandle::spawn(sink, 10);

        for i in 0..3 {
            handle.try_send(sample_result("s", i));
        }

        sleep(Duration::from_millis(50)).await;
        assert_eq!(handle.metrics().failure_count(), 3);

        handle.shutdown().await;
    }

    struct FlushCounter {
        flushes: Arc<AtomicU64>,
    }

    impl ResultSink for FlushCounter {
        fn name(&self) -> &str {
            "flush-counter"
        }

        async fn write(&mut self, _result: &ClassificationResult) -> Result<(), ContractError> {
            Ok(())
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            self.flushes.fetch_add(1, Ordering::Relaxed);
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_worker_flushes_while_running() {
        let flushes = Arc::new(AtomicU64::new(0));
        let sink = FlushCounter {
            flushes: Arc::clone(&flushes),
        };
        let handle = SinkHandle::with_flush_interval(sink, 10, Duration::from_millis(10));

        // Idle worker does not flush
        sleep(Duration::from_millis(40)).await;
        assert_eq!(flushes.load(Ordering::Relaxed), 0);

        assert!(handle.try_send(sample_result("s", 0)));
        sleep(Duration::from_millis(60)).await;
        assert_eq!(flushes.load(Ordering::Relaxed), 1);

        handle.shutdown().await;
        assert_eq!(flushes.load(Ordering::Relaxed), 2);
    }
}
