//! Replay Source - plays back recorded samples from a JSON Lines file
//!
//! One `RawSample` object per line:
//!
//! ```text
//! {"stream_id":"wrist","timestamp_us":0,"x":0.1,"y":0.0,"z":9.8}
//! ```
//!
//! File order is kept as-is (no sorting), so out-of-order or duplicate
//! records reach the validator exactly as they were recorded.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{RawSample, SampleCallback, SampleSource, StreamId};
use tracing::{debug, info};

use crate::error::{IngestionError, Result};

/// Read every record of a JSON Lines sample file. Blank lines are skipped.
pub fn read_samples(path: &Path) -> Result<Vec<RawSample>> {
    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample: RawSample =
            serde_json::from_str(&line).map_err(|e| IngestionError::InvalidRecord {
                path: path.display().to_string(),
                line: index + 1,
                message: e.to_string(),
            })?;
        samples.push(sample);
    }

    info!(path = %path.display(), records = samples.len(), "loaded replay file");
    Ok(samples)
}

/// Replays the recorded samples of one stream.
pub struct ReplaySource {
    stream_id: StreamId,
    records: Arc<Vec<RawSample>>,
    /// Playback speed multiplier (None = no pacing)
    speed: Option<f64>,
    listening: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
}

impl ReplaySource {
    pub fn new(stream_id: StreamId, records: Vec<RawSample>, speed: Option<f64>) -> Self {
        Self {
            stream_id,
            records: Arc::new(records),
            speed: speed.filter(|s| *s > 0.0),
            listening: Arc::new(AtomicBool::new(false)),
            exhausted: Arc::new(AtomicBool::new(false)),
        }
    }

    /// One source per stream found in the file, in order of first appearance.
    pub fn open_all(path: &Path, speed: Option<f64>) -> Result<Vec<ReplaySource>> {
        let mut order: Vec<StreamId> = Vec::new();
        let mut grouped: HashMap<StreamId, Vec<RawSample>> = HashMap::new();

        for sample in read_samples(path)? {
            let records = grouped.entry(sample.stream_id.clone()).or_insert_with(|| {
                order.push(sample.stream_id.clone());
                Vec::new()
            });
            records.push(sample);
        }

        Ok(order
            .into_iter()
            .filter_map(|id| {
                let records = grouped.remove(&id)?;
                Some(ReplaySource::new(id, records, speed))
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SampleSource for ReplaySource {
    fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    fn listen(&self, callback: SampleCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let stream_id = self.stream_id.clone();
        let records = self.records.clone();
        let speed = self.speed;
        let listening = self.listening.clone();
        let exhausted = self.exhausted.clone();

        thread::spawn(move || {
            debug!(stream_id = %stream_id, records = records.len(), ?speed, "replay started");
            let started = Instant::now();
            let first_ts = records.iter().find_map(|r| r.timestamp_us);
            let mut replayed = 0usize;

            for record in records.iter() {
                if !listening.load(Ordering::Relaxed) {
                    break;
                }

                if let (Some(speed), Some(first), Some(ts)) = (speed, first_ts, record.timestamp_us)
                {
                    let offset_us = (ts - first).max(0) as f64 / speed;
                    let due = Duration::from_micros(offset_us as u64);
                    let elapsed = started.elapsed();
                    if due > elapsed {
                        thread::sleep(due - elapsed);
                    }
                }

                callback(record.clone());
                replayed += 1;
            }

            if replayed == records.len() {
                exhausted.store(true, Ordering::SeqCst);
            }
            listening.store(false, Ordering::SeqCst);
            debug!(stream_id = %stream_id, replayed, "replay finished");
        });
    }

    fn stop(&self) {
        self.listening.store(false, Ordering::SeqCst);
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::Relaxed)
    }

    fn is_exhausted(&self) -> bool {
        self.exhausted.load(Ordering::Relaxed)
    }
}
