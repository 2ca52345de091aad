//! Frequency-domain features
//!
//! One forward FFT per axis over the mean-removed window. Only the
//! single-sided, non-DC part of the spectrum (bins `1..=n/2`) is used.

use std::sync::Arc;

use contracts::FrequencyBand;
use rustfft::num_complex::Complex;
use rustfft::Fft;

/// Total spectral power at or below this counts as a silent axis.
const SILENT_POWER: f64 = 1e-18;

/// Spectral features of one axis
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SpectralFeatures {
    /// Frequency of the strongest non-DC bin, Hz
    pub dominant_freq: f64,
    /// Single-sided amplitude of that bin
    pub dominant_mag: f64,
    /// Power per configured band, in band order
    pub band_energy: Vec<f64>,
    /// Shannon entropy of the normalised power spectrum, in `0..=1`
    pub entropy: f64,
}

impl SpectralFeatures {
    fn silent(bands: usize) -> Self {
        Self {
            band_energy: vec![0.0; bands],
            ..Default::default()
        }
    }
}

/// Compute spectral features of `signal` sampled at `sample_rate_hz`.
///
/// `fft` must be a forward plan of length `signal.len()`.
pub fn spectral_features(
    signal: &[f64],
    sample_rate_hz: f64,
    bands: &[FrequencyBand],
    fft: &Arc<dyn Fft<f64>>,
) -> SpectralFeatures {
    let n = signal.len();
    if n < 2 || fft.len() != n || sample_rate_hz <= 0.0 {
        return SpectralFeatures::silent(bands.len());
    }

    let mean = signal.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<Complex<f64>> = signal
        .iter()
        .map(|&v| Complex::new(v - mean, 0.0))
        .collect();
    fft.process(&mut buffer);

    let half = n / 2;
    let bin_hz = sample_rate_hz / n as f64;
    let power: Vec<f64> = buffer[1..=half]
        .iter()
        .map(|c| c.norm_sqr() / n as f64)
        .collect();

    let total: f64 = power.iter().sum();
    if total <= SILENT_POWER {
        return SpectralFeatures::silent(bands.len());
    }

    // Strongest bin; ties go to the lower frequency.
    let (peak, _) = power
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &p)| {
            if p > best.1 {
                (i, p)
            } else {
                best
            }
        });
    let peak_bin = peak + 1;
    let nyquist_bin = n % 2 == 0 && peak_bin == half;
    let scale = if nyquist_bin { 1.0 } else { 2.0 };
    let dominant_mag = scale * buffer[peak_bin].norm() / n as f64;

    let band_energy = bands
        .iter()
        .map(|band| {
            power
                .iter()
                .enumerate()
                .filter(|(i, _)| band.contains((i + 1) as f64 * bin_hz))
                .map(|(_, p)| p)
                .sum()
        })
        .collect();

    SpectralFeatures {
        dominant_freq: peak_bin as f64 * bin_hz,
        dominant_mag,
        band_energy,
        entropy: normalised_entropy(&power, total),
    }
}

fn normalised_entropy(power: &[f64], total: f64) -> f64 {
    if power.len() < 2 {
        return 0.0;
    }
    let entropy: f64 = power
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| {
            let q = p / total;
            -q * q.ln()
        })
        .sum();
    (entropy / (power.len() as f64).ln()).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustfft::FftPlanner;
    use std::f64::consts::PI;

    fn plan(n: usize) -> Arc<dyn Fft<f64>> {
        FftPlanner::new().plan_fft_forward(n)
    }

    fn default_bands() -> Vec<FrequencyBand> {
        vec![
            FrequencyBand::new(0.3, 1.0),
            FrequencyBand::new(1.0, 3.0),
            FrequencyBand::new(3.0, 8.0),
        ]
    }

    fn sine(freq_hz: f64, amplitude: f64, n: usize, rate_hz: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / rate_hz).sin())
            .collect()
    }

    #[test]
    fn test_sinusoid_dominant_frequency() {
        let n = 256;
        let signal = sine(5.0, 2.0, n, 100.0);
        let features = spectral_features(&signal, 100.0, &default_bands(), &plan(n));
        let bin_hz = 100.0 / n as f64;
        assert!((features.dominant_freq - 5.0).abs() <= bin_hz);
        assert!(features.dominant_mag > 1.0 && features.dominant_mag < 2.2);
        // All of the energy sits in the 3-8 Hz band.
        assert!(features.band_energy[2] > features.band_energy[0] + features.band_energy[1]);
    }

    #[test]
    fn test_bin_centred_sinusoid_is_exact() {
        // 32 cycles over 256 samples lands exactly on bin 32.
        let n = 256;
        let rate = 256.0;
        let features = spectral_features(&sine(32.0, 1.5, n, rate), rate, &[], &plan(n));
        assert!((features.dominant_freq - 32.0).abs() < 1e-9);
        assert!((features.dominant_mag - 1.5).abs() < 1e-9);
        assert!(features.entropy < 1e-6);
    }

    #[test]
    fn test_constant_signal_is_silent() {
        let n = 128;
        let features = spectral_features(&[9.8; 128], 100.0, &default_bands(), &plan(n));
        assert_eq!(features, SpectralFeatures::silent(3));
    }

    #[test]
    fn test_white_noise_has_high_entropy() {
        let n = 256;
        // Deterministic pseudo-random sequence
        let mut state: u64 = 0x2545_f491_4f6c_dd1d;
        let noise: Vec<f64> = (0..n)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                (state % 1000) as f64 / 500.0 - 1.0
            })
            .collect();
        let features = spectral_features(&noise, 100.0, &default_bands(), &plan(n));
        assert!(features.entropy > 0.8);
    }
}
