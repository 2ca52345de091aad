//! Per-stream sample buffer.
//!
//! A bounded ring buffer of validated samples in timestamp order. The
//! windower only ever appends at the back and trims from the front, so
//! `HeapRb` gives O(1) for both.

use std::fmt;

use contracts::Sample;
use ringbuf::{traits::*, HeapRb};

pub struct SampleBuffer {
    ring: HeapRb<Sample>,
    capacity: usize,
    last_timestamp: Option<i64>,
}

impl fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SampleBuffer")
            .field("len", &self.ring.occupied_len())
            .field("capacity", &self.capacity)
            .field("last_timestamp", &self.last_timestamp)
            .finish()
    }
}

impl SampleBuffer {
    #[inline]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: HeapRb::new(capacity),
            capacity,
            last_timestamp: None,
        }
    }

    /// Append a sample. Returns it back if the buffer is full.
    #[inline]
    pub fn push(&mut self, sample: Sample) -> Result<(), Sample> {
        let timestamp = sample.timestamp_us;
        self.ring.try_push(sample)?;
        self.last_timestamp = Some(timestamp);
        Ok(())
    }

    /// Drop samples older than `start_us`; returns how many were dropped.
    #[inline]
    pub fn trim_before(&mut self, start_us: i64) -> usize {
        let mut dropped = 0;
        while self
            .ring
            .try_peek()
            .is_some_and(|s| s.timestamp_us < start_us)
        {
            self.ring.try_pop();
            dropped += 1;
        }
        if self.ring.is_empty() {
            self.last_timestamp = None;
        }
        dropped
    }

    /// Copy of the buffered samples, oldest first.
    #[inline]
    pub fn to_vec(&self) -> Vec<Sample> {
        self.ring.iter().cloned().collect()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.ring.clear();
        self.last_timestamp = None;
    }

    /// Timestamp of the newest buffered sample
    #[inline]
    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ring.occupied_len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
