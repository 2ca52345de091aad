//! Backpressure configuration and metrics

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// What a source does when the fan-in channel is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Wait for room (file replay: never lose recorded samples)
    #[default]
    Block,
    /// Drop the incoming sample and count it (live sources)
    DropNewest,
}

/// Backpressure configuration
#[derive(Debug, Clone)]
pub struct BackpressureConfig {
    pub channel_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for BackpressureConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
            overflow: OverflowPolicy::Block,
        }
    }
}

impl BackpressureConfig {
    pub fn new(channel_capacity: usize, overflow: OverflowPolicy) -> Self {
        Self {
            channel_capacity,
            overflow,
        }
    }
}

/// Ingestion metrics shared by all registered sources
#[derive(Debug, Default)]
pub struct IngestionMetrics {
    samples_received: AtomicU64,
    samples_dropped: AtomicU64,
    queue_len: AtomicUsize,
}

impl IngestionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped(&self) {
        self.samples_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn update_queue_len(&self, len: usize) {
        self.queue_len.store(len, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            queue_len: self.queue_len.load(Ordering::Relaxed),
        }
    }
}

/// Metrics snapshot
#[derive(Debug, Clone, Default)]
pub struct MetricsSnapshot {
    pub samples_received: u64,
    pub samples_dropped: u64,
    pub queue_len: usize,
}
