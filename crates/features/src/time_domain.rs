//! Time-domain statistics

/// Standard deviations at or below this count as zero variance.
pub const ZERO_VARIANCE: f64 = 1e-12;

/// Statistics of one channel of a window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub rms: f64,
    /// Sign changes of the mean-removed signal per sample step
    pub zcr: f64,
    /// Mean absolute deviation from the mean
    pub mad: f64,
}

impl ChannelStats {
    /// Values in schema order (`mean, std, min, max, rms, zcr, mad`).
    pub fn to_array(&self) -> [f64; 7] {
        [
            self.mean, self.std, self.min, self.max, self.rms, self.zcr, self.mad,
        ]
    }
}

/// Two-pass statistics over `values`. Empty input yields all zeros.
pub fn channel_stats(values: &[f64]) -> ChannelStats {
    if values.is_empty() {
        return ChannelStats::default();
    }
    let n = values.len() as f64;

    let mean = values.iter().sum::<f64>() / n;
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum_sq = 0.0;
    let mut sum_sq_dev = 0.0;
    let mut sum_abs_dev = 0.0;

    for &v in values {
        min = min.min(v);
        max = max.max(v);
        sum_sq += v * v;
        let dev = v - mean;
        sum_sq_dev += dev * dev;
        sum_abs_dev += dev.abs();
    }

    ChannelStats {
        mean,
        std: (sum_sq_dev / n).sqrt(),
        min,
        max,
        rms: (sum_sq / n).sqrt(),
        zcr: zero_crossing_rate(values, mean),
        mad: sum_abs_dev / n,
    }
}

/// Strict sign changes of `values - mean`, normalised by `n - 1`.
fn zero_crossing_rate(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let crossings = values
        .windows(2)
        .filter(|w| (w[0] - mean) * (w[1] - mean) < 0.0)
        .count();
    crossings as f64 / (values.len() - 1) as f64
}

/// Pearson correlation; 0 when either channel has zero variance.
pub fn correlation(a: &[f64], a_stats: &ChannelStats, b: &[f64], b_stats: &ChannelStats) -> f64 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    if a_stats.std <= ZERO_VARIANCE || b_stats.std <= ZERO_VARIANCE {
        return 0.0;
    }
    let covariance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - a_stats.mean) * (y - b_stats.mean))
        .sum::<f64>()
        / a.len() as f64;
    (covariance / (a_stats.std * b_stats.std)).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_zero_channel() {
        let stats = channel_stats(&[0.0; 64]);
        assert_eq!(stats, ChannelStats::default());
    }

    #[test]
    fn test_known_values() {
        let stats = channel_stats(&[1.0, 3.0, 1.0, 3.0]);
        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std, 1.0);
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.max, 3.0);
        assert_eq!(stats.rms, 5.0_f64.sqrt());
        assert_eq!(stats.zcr, 1.0);
        assert_eq!(stats.mad, 1.0);
    }

    #[test]
    fn test_constant_channel_has_no_crossings() {
        let stats = channel_stats(&[9.8; 100]);
        assert_eq!(stats.zcr, 0.0);
        assert!(stats.std < ZERO_VARIANCE);
    }

    #[test]
    fn test_correlation() {
        let a = [1.0, 2.0, 3.0, 4.0];
        let b = [2.0, 4.0, 6.0, 8.0];
        let c = [4.0, 3.0, 2.0, 1.0];
        let (sa, sb, sc) = (channel_stats(&a), channel_stats(&b), channel_stats(&c));
        assert!((correlation(&a, &sa, &b, &sb) - 1.0).abs() < 1e-12);
        assert!((correlation(&a, &sa, &c, &sc) + 1.0).abs() < 1e-12);

        let flat = [5.0; 4];
        assert_eq!(correlation(&a, &sa, &flat, &channel_stats(&flat)), 0.0);
    }
}
