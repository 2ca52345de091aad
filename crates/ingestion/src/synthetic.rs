//! Synthetic accelerometer sources
//!
//! Deterministic (seeded) signals that look like common postures and gaits:
//! gravity on the axis the device faces plus a periodic component for gaits
//! and a little uniform noise. Used by tests and `activity-recognizer run --synthetic`.

use std::f64::consts::PI;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use contracts::{RawSample, SampleCallback, SampleSource, StreamId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

/// Standard gravity in m/s²
pub const GRAVITY: f64 = 9.80665;

/// Kind of motion to synthesize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityProfile {
    /// Device flat, gravity on z
    Sitting,
    /// Device upright, gravity on y
    Standing,
    /// Device on its side, gravity on x
    Lying,
    /// Upright, 2 Hz step cadence
    Walking,
    /// Upright, 2.8 Hz cadence with strong vertical impact
    Running,
}

impl ActivityProfile {
    pub const ALL: [ActivityProfile; 5] = [
        ActivityProfile::Sitting,
        ActivityProfile::Standing,
        ActivityProfile::Lying,
        ActivityProfile::Walking,
        ActivityProfile::Running,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ActivityProfile::Sitting => "sitting",
            ActivityProfile::Standing => "standing",
            ActivityProfile::Lying => "lying",
            ActivityProfile::Walking => "walking",
            ActivityProfile::Running => "running",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.name() == name)
    }

    /// Noise-free acceleration at time `t_s` seconds.
    pub fn acceleration(&self, t_s: f64) -> [f64; 3] {
        match self {
            ActivityProfile::Sitting => [0.0, 0.0, GRAVITY],
            ActivityProfile::Standing => [0.0, GRAVITY, 0.0],
            ActivityProfile::Lying => [GRAVITY, 0.0, 0.0],
            ActivityProfile::Walking => gait(t_s, 2.0, 3.0, 1.0, 0.5),
            ActivityProfile::Running => gait(t_s, 2.8, 8.0, 2.5, 1.0),
        }
    }
}

fn gait(t_s: f64, cadence_hz: f64, vertical: f64, forward: f64, lateral: f64) -> [f64; 3] {
    let phase = 2.0 * PI * cadence_hz * t_s;
    [
        lateral * (phase / 2.0).sin(),
        GRAVITY + vertical * phase.sin(),
        forward * (phase + PI / 2.0).sin(),
    ]
}

/// Synthetic source configuration
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub stream_id: StreamId,
    pub profile: ActivityProfile,
    pub rate_hz: f64,
    pub start_us: i64,
    /// Stop after this many samples (None = until stopped)
    pub total_samples: Option<u64>,
    /// Real-time multiplier (None = as fast as the consumer takes them)
    pub pace: Option<f64>,
    /// Uniform noise amplitude per axis, m/s²
    pub noise_ms2: f64,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            stream_id: "synthetic".into(),
            profile: ActivityProfile::Sitting,
            rate_hz: 100.0,
            start_us: 0,
            total_samples: None,
            pace: Some(1.0),
            noise_ms2: 0.05,
            seed: 7,
        }
    }
}

/// Deterministic sample generator.
pub struct SyntheticSignal {
    config: SyntheticConfig,
    rng: StdRng,
    index: u64,
}

impl SyntheticSignal {
    pub fn new(config: SyntheticConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            index: 0,
        }
    }

    pub fn next_sample(&mut self) -> RawSample {
        let offset_s = self.index as f64 / self.config.rate_hz;
        let timestamp_us = self.config.start_us + (offset_s * 1_000_000.0).round() as i64;
        let [x, y, z] = self.config.profile.acceleration(offset_s);
        let noise = self.config.noise_ms2;
        let mut jitter = || {
            if noise > 0.0 {
                self.rng.random_range(-noise..noise)
            } else {
                0.0
            }
        };
        let sample = RawSample::new(
            self.config.stream_id.clone(),
            timestamp_us,
            x + jitter(),
            y + jitter(),
            z + jitter(),
        );
        self.index += 1;
        sample
    }

    /// Next `n` samples.
    pub fn take(&mut self, n: usize) -> Vec<RawSample> {
        (0..n).map(|_| self.next_sample()).collect()
    }
}

/// [`SampleSource`] driving a [`SyntheticSignal`] from a background thread.
pub struct SyntheticSource {
    config: SyntheticConfig,
    listening: Arc<AtomicBool>,
    exhausted: Arc<AtomicBool>,
}

impl SyntheticSource {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            listening: Arc::new(AtomicBool::new(false)),
            exhausted: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl SampleSource for SyntheticSource {
    fn stream_id(&self) -> &StreamId {
        &self.config.stream_id
    }

    fn listen(&self, callback: SampleCallback) {
        if self.listening.swap(true, Ordering::SeqCst) {
            return;
        }

        let config = self.config.clone();
        let listening = self.listening.clone();
        let exhausted = self.exhausted.clone();

        thread::spawn(move || {
            let period = Duration::from_secs_f64(1.0 / config.rate_hz);
            let pace = config.pace.filter(|p| *p > 0.0);
            let total = config.total_samples;
            let stream_id = config.stream_id.clone();
            let mut signal = SyntheticSignal::new(config);
            let started = Instant::now();
            let mut sent: u64 = 0;

            debug!(stream_id = %stream_id, ?pace, ?total, "synthetic source started");

            while listening.load(Ordering::Relaxed) {
                if total.is_some_and(|t| sent >= t) {
                    exhausted.store(true, Ordering::SeqCst);
                    break;
                }

                callback(signal.next_sample());
                sent += 1;
                trace!(stream_id = %stream_id, sent, "synthetic sample sent");

                if let Some(pace) = pace {
                    let due = period.mul_f64(sent as f64 / pace);
                    let elapsed = started.elapsed();
                    if due > elapsed {
                        thread::sleep(due - elapsed);
                    }
                }
            }

            listening.store(false, Ordering::SeqCst);
            debug!(stream_id = %stream_id, sent, "synthetic source stopped");
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

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_signal_is_deterministic() {
        let config = SyntheticConfig {
            profile: ActivityProfile::Walking,
            ..Default::default()
        };
        let a = SyntheticSignal::new(config.clone()).take(50);
        let b = SyntheticSignal::new(config).take(50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_timestamps_follow_rate() {
        let samples = SyntheticSignal::new(SyntheticConfig {
            rate_hz: 50.0,
            start_us: 1_000,
            ..Default::default()
        })
        .take(3);
        let ts: Vec<i64> = samples.iter().map(|s| s.timestamp_us.unwrap()).collect();
        assert_eq!(ts, vec![1_000, 21_000, 41_000]);
    }

    #[test]
    fn test_static_profiles_put_gravity_on_one_axis() {
        assert_eq!(ActivityProfile::Sitting.acceleration(1.0), [0.0, 0.0, GRAVITY]);
        assert_eq!(ActivityProfile::Standing.acceleration(1.0), [0.0, GRAVITY, 0.0]);
        assert_eq!(ActivityProfile::Lying.acceleration(1.0), [GRAVITY, 0.0, 0.0]);
    }

    #[test]
    fn test_noise_free_signal_is_exact() {
        let sample = SyntheticSignal::new(SyntheticConfig {
            noise_ms2: 0.0,
            ..Default::default()
        })
        .next_sample();
        assert_eq!(sample.z, Some(GRAVITY));
    }

    #[test]
    fn test_profile_names_round_trip() {
        for profile in ActivityProfile::ALL {
            assert_eq!(ActivityProfile::from_name(profile.name()), Some(profile));
        }
        assert_eq!(ActivityProfile::from_name("swimming"), None);
    }

    #[test]
    fn test_finite_source_becomes_exhausted() {
        let source = SyntheticSource::new(SyntheticConfig {
            total_samples: Some(20),
            pace: None,
            ..Default::default()
        });
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        source.listen(Arc::new(move |s| sink.lock().push(s)));

        let deadline = Instant::now() + Duration::from_secs(2);
        while !source.is_exhausted() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(source.is_exhausted());
        assert_eq!(received.lock().len(), 20);
    }
}
