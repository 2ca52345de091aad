//! Bridges a [`SampleSource`] callback into the shared fan-in channel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_channel::{Sender, TrySendError};
use contracts::{RawSample, SampleCallback, SampleSource, StreamId};
use metrics::counter;
use tracing::{debug, trace, warn};

use crate::config::{BackpressureConfig, IngestionMetrics, OverflowPolicy};

/// Wraps one source and forwards its samples with the configured overflow policy.
pub struct SourceAdapter {
    source: Box<dyn SampleSource>,
    config: BackpressureConfig,
    listening: Arc<AtomicBool>,
}

impl SourceAdapter {
    pub fn new(source: Box<dyn SampleSource>, config: BackpressureConfig) -> Self {
        Self {
            source,
            config,
            listening: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stream_id(&self) -> &StreamId {
        self.source.stream_id()
    }

    pub fn start(&self, tx: Sender<RawSample>, metrics: Arc<IngestionMetrics>) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let stream_id = self.source.stream_id().clone();
        let overflow = self.config.overflow;
        let listening = self.listening.clone();

        debug!(stream_id = %stream_id, ?overflow, "starting source adapter");

        let callback: SampleCallback = Arc::new(move |sample| {
            if !listening.load(Ordering::Relaxed) {
                return;
            }
            metrics.record_received();
            send_sample(&tx, sample, &metrics, &stream_id, overflow);
        });

        self.source.listen(callback);
    }

    pub fn stop(&self) {
        if self.listening.swap(false, Ordering::SeqCst) {
            debug!(stream_id = %self.source.stream_id(), "stopping source adapter");
            self.source.stop();
        }
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    pub fn is_exhausted(&self) -> bool {
        self.source.is_exhausted()
    }
}

/// Send one sample, applying the overflow policy.
#[inline]
fn send_sample(
    tx: &Sender<RawSample>,
    sample: RawSample,
    metrics: &IngestionMetrics,
    stream_id: &StreamId,
    overflow: OverflowPolicy,
) {
    let sent = match overflow {
        OverflowPolicy::Block => tx.send_blocking(sample).is_ok(),
        OverflowPolicy::DropNewest => match tx.try_send(sample) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                metrics.record_dropped();
                counter!("activity_ingestion_dropped_total", "stream_id" => stream_id.to_string())
                    .increment(1);
                trace!(stream_id = %stream_id, "sample dropped (channel full)");
                return;
            }
            Err(TrySendError::Closed(_)) => false,
        },
    };

    if sent {
        metrics.update_queue_len(tx.len());
    } else {
        warn!(stream_id = %stream_id, "ingestion channel closed");
    }
}
