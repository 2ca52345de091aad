//! RecognitionBlueprint - output of the config loader
//!
//! Describes the whole pipeline: sample validation bounds, windowing,
//! feature bands, the model artifact, the concurrent service and result sinks.
//! Field-level bounds are declared with `validator`; cross-field rules live
//! in `config_loader`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use validator::Validate;

/// Configuration format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RecognitionBlueprint {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    #[validate(nested)]
    pub validator: ValidatorConfig,

    #[serde(default)]
    #[validate(nested)]
    pub window: WindowConfig,

    #[serde(default)]
    #[validate(nested)]
    pub features: FeatureConfig,

    #[validate(nested)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    #[validate(nested)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Sample validator bounds
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ValidatorConfig {
    /// Per-axis bound in m/s² (default 16 g)
    #[serde(default = "default_accel_bound")]
    #[validate(range(exclusive_min = 0.0))]
    pub accel_bound_ms2: f64,

    /// What to do with readings beyond the bound
    #[serde(default)]
    pub out_of_range: OutOfRangePolicy,

    /// Accepted clock skew into the future, in ms (None = no check)
    #[serde(default)]
    #[validate(range(min = 1))]
    pub max_future_skew_ms: Option<u64>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            accel_bound_ms2: default_accel_bound(),
            out_of_range: OutOfRangePolicy::default(),
            max_future_skew_ms: None,
        }
    }
}

fn default_accel_bound() -> f64 {
    156.8
}

/// Out-of-range handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutOfRangePolicy {
    /// Saturate the axis at ±bound
    #[default]
    Clamp,
    /// Reject the whole sample
    Reject,
}

/// Sliding window configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct WindowConfig {
    /// Window duration L in milliseconds
    #[serde(default = "default_window_duration_ms")]
    #[validate(range(min = 10, max = 600_000))]
    pub duration_ms: u64,

    /// Overlap between consecutive windows, step S = L·(1 − overlap)
    #[serde(default = "default_overlap_ratio")]
    #[validate(range(min = 0.0, max = 0.95))]
    pub overlap_ratio: f64,

    /// Nominal sampling rate of the device
    #[serde(default = "default_nominal_rate_hz")]
    #[validate(range(exclusive_min = 0.0, max = 10_000.0))]
    pub nominal_rate_hz: f64,

    /// Gap threshold as a multiple of the nominal period
    #[serde(default = "default_gap_factor")]
    #[validate(range(min = 1.0))]
    pub gap_factor: f64,

    /// Explicit gap threshold in ms, overrides `gap_factor`
    #[serde(default)]
    #[validate(range(min = 1))]
    pub gap_threshold_ms: Option<u64>,

    /// Coverage below this marks a window incomplete
    #[serde(default = "default_min_coverage")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub min_coverage: f64,

    /// Per-stream buffer bound
    #[serde(default = "default_max_samples")]
    #[validate(range(min = 2))]
    pub max_samples: usize,

    /// Linearly resample onto the nominal grid before windowing
    #[serde(default)]
    pub resample: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            duration_ms: default_window_duration_ms(),
            overlap_ratio: default_overlap_ratio(),
            nominal_rate_hz: default_nominal_rate_hz(),
            gap_factor: default_gap_factor(),
            gap_threshold_ms: None,
            min_coverage: default_min_coverage(),
            max_samples: default_max_samples(),
            resample: false,
        }
    }
}

impl WindowConfig {
    /// Window length in microseconds.
    pub fn window_us(&self) -> i64 {
        self.duration_ms as i64 * 1000
    }

    /// Step between window starts in microseconds (at least 1).
    pub fn step_us(&self) -> i64 {
        ((self.window_us() as f64) * (1.0 - self.overlap_ratio))
            .round()
            .max(1.0) as i64
    }

    /// Nominal sampling period in microseconds.
    pub fn period_us(&self) -> f64 {
        1_000_000.0 / self.nominal_rate_hz
    }

    /// Largest inter-sample spacing that is not a gap.
    pub fn gap_threshold_us(&self) -> i64 {
        match self.gap_threshold_ms {
            Some(ms) => ms as i64 * 1000,
            None => (self.period_us() * self.gap_factor).round() as i64,
        }
    }

    /// Sample count of a fully covered window.
    pub fn expected_samples(&self) -> usize {
        ((self.window_us() as f64) / self.period_us()).round().max(1.0) as usize
    }
}

fn default_window_duration_ms() -> u64 {
    2560
}

fn default_overlap_ratio() -> f64 {
    0.5
}

fn default_nominal_rate_hz() -> f64 {
    100.0
}

fn default_gap_factor() -> f64 {
    3.0
}

fn default_min_coverage() -> f64 {
    0.8
}

fn default_max_samples() -> usize {
    1024
}

/// Feature extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FeatureConfig {
    /// Windows with fewer samples are dropped
    #[serde(default = "default_min_samples")]
    #[validate(range(min = 2))]
    pub min_samples: usize,

    /// Spectral sub-bands, each `[low_hz, high_hz)`
    #[serde(default = "default_bands")]
    #[validate(nested)]
    pub bands: Vec<FrequencyBand>,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            min_samples: default_min_samples(),
            bands: default_bands(),
        }
    }
}

fn default_min_samples() -> usize {
    32
}

fn default_bands() -> Vec<FrequencyBand> {
    vec![
        FrequencyBand::new(0.3, 1.0),
        FrequencyBand::new(1.0, 3.0),
        FrequencyBand::new(3.0, 8.0),
    ]
}

/// Half-open frequency band in Hz
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct FrequencyBand {
    #[validate(range(min = 0.0))]
    pub low_hz: f64,
    #[validate(range(exclusive_min = 0.0))]
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    #[inline]
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz < self.high_hz
    }
}

/// Model artifact and inference settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ClassifierConfig {
    /// Path to the JSON model artifact
    pub model_path: PathBuf,

    /// Top score below this yields `unknown`
    #[serde(default = "default_confidence_threshold")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,
}

fn default_confidence_threshold() -> f64 {
    0.4
}

/// Concurrent service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServiceConfig {
    /// Number of single-writer shard workers
    #[serde(default = "default_shards")]
    #[validate(range(min = 1, max = 256))]
    pub shards: usize,

    /// Command queue capacity per shard
    #[serde(default = "default_queue_capacity")]
    #[validate(range(min = 1))]
    pub queue_capacity: usize,

    /// Streams without samples for this long are closed
    #[serde(default = "default_idle_timeout_s")]
    #[validate(range(min = 1))]
    pub idle_timeout_s: u64,

    /// How often shards look for idle streams
    #[serde(default = "default_idle_check_interval_ms")]
    #[validate(range(min = 10))]
    pub idle_check_interval_ms: u64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            queue_capacity: default_queue_capacity(),
            idle_timeout_s: default_idle_timeout_s(),
            idle_check_interval_ms: default_idle_check_interval_ms(),
        }
    }
}

fn default_shards() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_idle_timeout_s() -> u64 {
    300
}

fn default_idle_check_interval_ms() -> u64 {
    1000
}

/// Result sink configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub name: String,

    pub sink_type: SinkType,

    #[serde(default = "default_sink_queue_capacity")]
    pub queue_capacity: usize,

    /// Type specific parameters (e.g. `path` for json_lines)
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_sink_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// tracing events
    Log,
    /// One JSON object per line, to a file or stdout
    JsonLines,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_window_geometry() {
        let window = WindowConfig::default();
        assert_eq!(window.window_us(), 2_560_000);
        assert_eq!(window.step_us(), 1_280_000);
        assert_eq!(window.expected_samples(), 256);
        assert_eq!(window.gap_threshold_us(), 30_000);
    }

    #[test]
    fn test_explicit_gap_threshold_wins() {
        let window = WindowConfig {
            gap_threshold_ms: Some(250),
            ..Default::default()
        };
        assert_eq!(window.gap_threshold_us(), 250_000);
    }

    #[test]
    fn test_zero_overlap_steps_by_full_window() {
        let window = WindowConfig {
            overlap_ratio: 0.0,
            ..Default::default()
        };
        assert_eq!(window.step_us(), window.window_us());
    }

    #[test]
    fn test_field_bounds_are_checked() {
        let mut validator = ValidatorConfig::default();
        assert!(validator.validate().is_ok());
        validator.accel_bound_ms2 = 0.0;
        assert!(validator.validate().is_err());

        let window = WindowConfig {
            overlap_ratio: 0.99,
            ..Default::default()
        };
        assert!(window.validate().is_err());
    }

    #[test]
    fn test_band_contains_is_half_open() {
        let band = FrequencyBand::new(1.0, 3.0);
        assert!(band.contains(1.0));
        assert!(band.contains(2.999));
        assert!(!band.contains(3.0));
    }
}
