//! Per-stream counters
//!
//! Lock-free atomics per stream, kept in a concurrent map so any shard can
//! record and any reader can query. Counters outlive the stream itself:
//! closing or evicting a stream does not reset what it accumulated.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{RejectionReason, StreamId};
use dashmap::DashMap;

/// Counters of one stream
#[derive(Debug, Default)]
pub struct StreamCounters {
    samples_received: AtomicU64,
    samples_accepted: AtomicU64,
    rejected: [AtomicU64; RejectionReason::ALL.len()],
    windows_emitted: AtomicU64,
    windows_incomplete: AtomicU64,
    windows_dropped: AtomicU64,
    gap_events: AtomicU64,
    results_emitted: AtomicU64,
    results_unknown: AtomicU64,
}

impl StreamCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_received(&self) {
        self.samples_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_accepted(&self) {
        self.samples_accepted.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self, reason: RejectionReason) {
        self.rejected[reason.index()].fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_window(&self, complete: bool) {
        self.windows_emitted.fetch_add(1, Ordering::Relaxed);
        if !complete {
            self.windows_incomplete.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_window_dropped(&self) {
        self.windows_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_gaps(&self, count: u64) {
        if count > 0 {
            self.gap_events.fetch_add(count, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_result(&self, unknown: bool) {
        self.results_emitted.fetch_add(1, Ordering::Relaxed);
        if unknown {
            self.results_unknown.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let mut samples_rejected = [0; RejectionReason::ALL.len()];
        for (slot, counter) in samples_rejected.iter_mut().zip(&self.rejected) {
            *slot = counter.load(Ordering::Relaxed);
        }
        CounterSnapshot {
            samples_received: self.samples_received.load(Ordering::Relaxed),
            samples_accepted: self.samples_accepted.load(Ordering::Relaxed),
            samples_rejected,
            windows_emitted: self.windows_emitted.load(Ordering::Relaxed),
            windows_incomplete: self.windows_incomplete.load(Ordering::Relaxed),
            windows_dropped: self.windows_dropped.load(Ordering::Relaxed),
            gap_events: self.gap_events.load(Ordering::Relaxed),
            results_emitted: self.results_emitted.load(Ordering::Relaxed),
            results_unknown: self.results_unknown.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of a stream's counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub samples_received: u64,
    pub samples_accepted: u64,
    /// Indexed by [`RejectionReason::index`]
    pub samples_rejected: [u64; RejectionReason::ALL.len()],
    pub windows_emitted: u64,
    pub windows_incomplete: u64,
    pub windows_dropped: u64,
    pub gap_events: u64,
    pub results_emitted: u64,
    pub results_unknown: u64,
}

impl CounterSnapshot {
    pub fn rejected(&self, reason: RejectionReason) -> u64 {
        self.samples_rejected[reason.index()]
    }

    pub fn total_rejected(&self) -> u64 {
        self.samples_rejected.iter().sum()
    }

    /// Non-zero rejection counts with their reasons
    pub fn rejections(&self) -> impl Iterator<Item = (RejectionReason, u64)> + '_ {
        RejectionReason::ALL
            .iter()
            .map(|reason| (*reason, self.rejected(*reason)))
            .filter(|(_, count)| *count > 0)
    }
}

/// Counters of every stream seen so far
#[derive(Debug, Default)]
pub struct CounterRegistry {
    streams: DashMap<StreamId, Arc<StreamCounters>>,
}

impl CounterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters of a stream, created on first use.
    pub fn counters(&self, stream_id: &StreamId) -> Arc<StreamCounters> {
        if let Some(existing) = self.streams.get(stream_id) {
            return existing.clone();
        }
        self.streams
            .entry(stream_id.clone())
            .or_insert_with(|| Arc::new(StreamCounters::new()))
            .clone()
    }

    pub fn snapshot(&self, stream_id: &StreamId) -> Option<CounterSnapshot> {
        self.streams.get(stream_id).map(|c| c.snapshot())
    }

    /// Snapshots of all streams, sorted by stream id.
    pub fn all(&self) -> Vec<(StreamId, CounterSnapshot)> {
        let mut all: Vec<_> = self
            .streams
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().snapshot()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Forget a stream's counters.
    pub fn remove(&self, stream_id: &StreamId) -> Option<CounterSnapshot> {
        self.streams.remove(stream_id).map(|(_, c)| c.snapshot())
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
