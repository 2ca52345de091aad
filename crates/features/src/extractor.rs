//! Window → feature vector

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use contracts::{FeatureConfig, FeatureSchema, FeatureVector, FrequencyBand, Window};
use nalgebra::Vector3;
use parking_lot::Mutex;
use rustfft::{Fft, FftPlanner};
use tracing::{instrument, trace};

use crate::error::FeatureError;
use crate::schema::{build_schema, CORRELATION_PAIRS};
use crate::spectral::spectral_features;
use crate::time_domain::{channel_stats, correlation};

/// Deterministic feature extractor.
///
/// Pure: the same window always yields a bit-identical vector.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    min_samples: usize,
    bands: Vec<FrequencyBand>,
    schema: Arc<FeatureSchema>,
    plans: FftPlans,
}

/// Forward FFT plans by window length, shared between clones.
#[derive(Clone, Default)]
struct FftPlans {
    by_len: Arc<Mutex<HashMap<usize, Arc<dyn Fft<f64>>>>>,
}

impl FftPlans {
    fn forward(&self, len: usize) -> Arc<dyn Fft<f64>> {
        self.by_len
            .lock()
            .entry(len)
            .or_insert_with(|| FftPlanner::new().plan_fft_forward(len))
            .clone()
    }

    fn len(&self) -> usize {
        self.by_len.lock().len()
    }
}

impl fmt::Debug for FftPlans {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftPlans").field("cached", &self.len()).finish()
    }
}

impl FeatureExtractor {
    pub fn new(config: &FeatureConfig) -> Self {
        Self {
            min_samples: config.min_samples,
            bands: config.bands.clone(),
            schema: Arc::new(build_schema(config.bands.len())),
            plans: FftPlans::default(),
        }
    }

    /// Layout of every vector this extractor produces.
    pub fn schema(&self) -> Arc<FeatureSchema> {
        self.schema.clone()
    }

    pub fn min_samples(&self) -> usize {
        self.min_samples
    }

    /// # Errors
    /// [`FeatureError::InsufficientSamples`] when the window holds fewer than
    /// `min_samples` samples.
    #[instrument(
        level = "trace",
        name = "feature_extract",
        skip(self, window),
        fields(stream_id = %window.stream_id, start_us = window.start_us, samples = window.len())
    )]
    pub fn extract(&self, window: &Window) -> Result<FeatureVector, FeatureError> {
        let n = window.len();
        if n < self.min_samples.max(2) {
            return Err(FeatureError::InsufficientSamples {
                stream_id: window.stream_id.clone(),
                samples: n,
                required: self.min_samples.max(2),
            });
        }

        let mut axes: [Vec<f64>; 3] = [
            Vec::with_capacity(n),
            Vec::with_capacity(n),
            Vec::with_capacity(n),
        ];
        let mut magnitude = Vec::with_capacity(n);
        for s in &window.samples {
            axes[0].push(s.x);
            axes[1].push(s.y);
            axes[2].push(s.z);
            magnitude.push(Vector3::new(s.x, s.y, s.z).norm());
        }

        let mut values = Vec::with_capacity(self.schema.len());

        let axis_stats = [
            channel_stats(&axes[0]),
            channel_stats(&axes[1]),
            channel_stats(&axes[2]),
        ];
        for stats in &axis_stats {
            values.extend(stats.to_array());
        }
        values.extend(channel_stats(&magnitude).to_array());

        let sample_rate_hz = estimate_rate_hz(window);
        let fft = self.plans.forward(n);
        for axis in &axes {
            let spectral = spectral_features(axis, sample_rate_hz, &self.bands, &fft);
            values.push(spectral.dominant_freq);
            values.push(spectral.dominant_mag);
            values.extend(spectral.band_energy);
            values.push(spectral.entropy);
        }

        for (a, b, _) in CORRELATION_PAIRS {
            values.push(correlation(&axes[a], &axis_stats[a], &axes[b], &axis_stats[b]));
        }

        debug_assert_eq!(values.len(), self.schema.len());
        trace!(sample_rate_hz, features = values.len(), "features extracted");

        Ok(FeatureVector {
            stream_id: window.stream_id.clone(),
            start_us: window.start_us,
            end_us: window.end_us,
            schema: self.schema.clone(),
            values,
            quality: window.quality,
        })
    }
}

/// Sampling rate implied by the window's own timestamps.
fn estimate_rate_hz(window: &Window) -> f64 {
    match (window.samples.first(), window.samples.last()) {
        (Some(first), Some(last)) if last.timestamp_us > first.timestamp_us => {
            let span_s = (last.timestamp_us as f64 - first.timestamp_us as f64) / 1_000_000.0;
            (window.len() - 1) as f64 / span_s
        }
        _ => 0.0,
    }
}
