//! Sliding-window engine.

use std::collections::HashMap;

use contracts::{CloseReason, QualityFlag, Sample, StreamId, Window, WindowConfig};
use tracing::{debug, instrument, trace, warn};

use crate::buffer::SampleBuffer;
use crate::resample::Resampler;

/// Window geometry resolved from [`WindowConfig`], in microseconds.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    window_us: i64,
    step_us: i64,
    period_us: f64,
    /// Nominal period rounded to a whole microsecond (the last sample slot)
    slot_us: i64,
    gap_threshold_us: i64,
    expected_samples: usize,
    min_coverage: f64,
    max_samples: usize,
    resample: bool,
}

impl Geometry {
    fn from_config(config: &WindowConfig) -> Self {
        let period_us = config.period_us();
        Self {
            window_us: config.window_us(),
            step_us: config.step_us(),
            period_us,
            slot_us: (period_us.round() as i64).max(1),
            gap_threshold_us: config.gap_threshold_us(),
            expected_samples: config.expected_samples(),
            min_coverage: config.min_coverage,
            max_samples: config.max_samples,
            resample: config.resample,
        }
    }
}

/// Per-stream windowing diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowerStats {
    pub windows_emitted: u64,
    pub gap_events: u64,
    pub samples_interpolated: u64,
    pub overflow_events: u64,
}

/// Windowing state of one stream
#[derive(Debug)]
struct StreamWindower {
    stream_id: StreamId,
    geometry: Geometry,
    buffer: SampleBuffer,
    resampler: Option<Resampler>,
    /// Start of the in-progress window
    window_start: Option<i64>,
    /// Last raw (pre-resampling) timestamp, for gap detection
    last_raw_ts: Option<i64>,
    /// Newest sample timestamp already part of an emitted window
    emitted_through: Option<i64>,
    stats: WindowerStats,
}

impl StreamWindower {
    fn new(stream_id: StreamId, geometry: Geometry) -> Self {
        Self {
            stream_id,
            buffer: SampleBuffer::new(geometry.max_samples),
            resampler: geometry
                .resample
                .then(|| Resampler::new(geometry.period_us)),
            geometry,
            window_start: None,
            last_raw_ts: None,
            emitted_through: None,
            stats: WindowerStats::default(),
        }
    }

    fn push(&mut self, sample: Sample, out: &mut Vec<Window>) {
        let ts = sample.timestamp_us;
        if let Some(last) = self.last_raw_ts {
            let spacing = ts.saturating_sub(last);
            if spacing > self.geometry.gap_threshold_us {
                self.on_gap(spacing, out);
            }
        }
        self.last_raw_ts = Some(ts);

        if let Some(resampler) = self.resampler.as_mut() {
            let (grid, interpolated) = resampler.push(sample);
            self.stats.samples_interpolated += interpolated;
            for s in grid {
                self.accept(s, out);
            }
        } else {
            self.accept(sample, out);
        }
    }

    fn on_gap(&mut self, spacing_us: i64, out: &mut Vec<Window>) {
        self.stats.gap_events += 1;
        metrics::counter!("activity_window_gaps_total").increment(1);
        debug!(
            stream_id = %self.stream_id,
            spacing_us,
            threshold_us = self.geometry.gap_threshold_us,
            "gap detected, closing in-progress window"
        );

        out.extend(self.close(CloseReason::Gap));
        self.reset();
    }

    fn accept(&mut self, sample: Sample, out: &mut Vec<Window>) {
        let ts = sample.timestamp_us;
        let window_us = self.geometry.window_us;
        let mut start = *self.window_start.get_or_insert(ts);

        // The sample lies past the in-progress window: that window is done.
        while reaches(ts, start, window_us) {
            out.extend(self.close(CloseReason::Full));
            start = self.advance(start);
            if self.buffer.is_empty() && reaches(ts, start, window_us) {
                start = ts;
                self.window_start = Some(ts);
            }
        }

        if self.buffer.is_full() {
            warn!(
                stream_id = %self.stream_id,
                capacity = self.buffer.capacity(),
                "window buffer full, closing early"
            );
            metrics::counter!("activity_window_overflow_total").increment(1);
            self.stats.overflow_events += 1;
            out.extend(self.close(CloseReason::Overflow));
            self.buffer.clear();
            start = ts;
            self.window_start = Some(ts);
        }

        let _ = self.buffer.push(sample);

        // The last nominal slot of the window is filled.
        while reaches(ts, start, window_us - self.geometry.slot_us) {
            out.extend(self.close(CloseReason::Full));
            start = self.advance(start);
        }
    }

    /// Move to the next window and drop samples that fall before it.
    fn advance(&mut self, start: i64) -> i64 {
        let next = start.saturating_add(self.geometry.step_us);
        self.window_start = Some(next);
        self.buffer.trim_before(next);
        next
    }

    /// Build the in-progress window, if it holds samples not yet emitted.
    fn close(&mut self, reason: CloseReason) -> Option<Window> {
        let start_us = self.window_start?;
        let last_ts = self.buffer.last_timestamp()?;
        if self.emitted_through.is_some_and(|t| last_ts <= t) {
            return None;
        }

        let samples = self.buffer.to_vec();
        let coverage = (samples.len() as f64 / self.geometry.expected_samples as f64).min(1.0);
        let full_end = start_us.saturating_add(self.geometry.window_us);
        let end_us = match reason {
            CloseReason::Full => full_end,
            _ => full_end.min(last_ts.saturating_add(self.geometry.slot_us)),
        };
        let quality = if reason == CloseReason::Gap || coverage < self.geometry.min_coverage {
            QualityFlag::Incomplete
        } else {
            QualityFlag::Complete
        };

        self.emitted_through = Some(last_ts);
        self.stats.windows_emitted += 1;
        trace!(
            stream_id = %self.stream_id,
            start_us,
            end_us,
            samples = samples.len(),
            coverage,
            ?reason,
            "window closed"
        );

        Some(Window {
            stream_id: self.stream_id.clone(),
            start_us,
            end_us,
            samples,
            coverage,
            quality,
            close_reason: reason,
        })
    }

    fn flush(&mut self) -> Option<Window> {
        let window = self.close(CloseReason::Flush);
        self.reset();
        window
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.window_start = None;
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.reset();
        }
    }
}

/// `ts >= start + offset`, without overflowing near the ends of the `i64` range
#[inline]
fn reaches(ts: i64, start: i64, offset: i64) -> bool {
    i128::from(ts) >= i128::from(start) + i128::from(offset)
}

/// Per-stream sliding windows over validated samples.
///
/// Streams are created on first sample. Samples of one stream must arrive
/// with strictly increasing timestamps (the validator guarantees this).
#[derive(Debug)]
pub struct WindowingEngine {
    config: WindowConfig,
    geometry: Geometry,
    streams: HashMap<StreamId, StreamWindower>,
}

impl WindowingEngine {
    pub fn new(config: WindowConfig) -> Self {
        let geometry = Geometry::from_config(&config);
        Self {
            config,
            geometry,
            streams: HashMap::new(),
        }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Buffer a sample; returns every window it completes, oldest first.
    #[instrument(
        level = "trace",
        name = "windowing_push",
        skip(self, sample),
        fields(stream_id = %sample.stream_id, timestamp_us = sample.timestamp_us)
    )]
    pub fn push(&mut self, sample: Sample) -> Vec<Window> {
        let mut out = Vec::new();
        match self.streams.get_mut(&sample.stream_id) {
            Some(windower) => windower.push(sample, &mut out),
            None => {
                let stream_id = sample.stream_id.clone();
                let mut windower = StreamWindower::new(stream_id.clone(), self.geometry);
                windower.push(sample, &mut out);
                self.streams.insert(stream_id, windower);
            }
        }
        out
    }

    /// Emit the in-progress partial window of a stream.
    pub fn flush(&mut self, stream_id: &StreamId) -> Option<Window> {
        self.streams.get_mut(stream_id)?.flush()
    }

    /// Drop all state of a stream, returning its final diagnostics.
    pub fn remove(&mut self, stream_id: &StreamId) -> Option<WindowerStats> {
        self.streams.remove(stream_id).map(|w| w.stats)
    }

    pub fn stats(&self, stream_id: &StreamId) -> Option<WindowerStats> {
        self.streams.get(stream_id).map(|w| w.stats)
    }

    /// Samples currently buffered for a stream
    pub fn buffered(&self, stream_id: &StreamId) -> usize {
        self.streams.get(stream_id).map_or(0, |w| w.buffer.len())
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}
