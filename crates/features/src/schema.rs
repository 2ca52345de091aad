//! Feature layout

use contracts::{FeatureSchema, FEATURE_SCHEMA_VERSION};

/// Channels with time-domain statistics, in output order
pub const TIME_CHANNELS: [&str; 4] = ["x", "y", "z", "mag"];

/// Time-domain statistics, in output order
pub const TIME_STATS: [&str; 7] = ["mean", "std", "min", "max", "rms", "zcr", "mad"];

/// Axes with spectral features, in output order
pub const SPECTRAL_AXES: [&str; 3] = ["x", "y", "z"];

/// Axis pairs for Pearson correlation, in output order
pub const CORRELATION_PAIRS: [(usize, usize, &str); 3] =
    [(0, 1, "corr_xy"), (1, 2, "corr_yz"), (0, 2, "corr_xz")];

/// Feature names for `band_count` spectral sub-bands.
///
/// Order: time-domain (x, y, z, mag), spectral (x, y, z), correlations.
pub fn feature_names(band_count: usize) -> Vec<String> {
    let mut names = Vec::with_capacity(feature_count(band_count));

    for channel in TIME_CHANNELS {
        for stat in TIME_STATS {
            names.push(format!("{channel}_{stat}"));
        }
    }

    for axis in SPECTRAL_AXES {
        names.push(format!("{axis}_dominant_freq"));
        names.push(format!("{axis}_dominant_mag"));
        for band in 0..band_count {
            names.push(format!("{axis}_band{band}_energy"));
        }
        names.push(format!("{axis}_spectral_entropy"));
    }

    names.extend(CORRELATION_PAIRS.iter().map(|(_, _, name)| name.to_string()));
    names
}

pub fn feature_count(band_count: usize) -> usize {
    TIME_CHANNELS.len() * TIME_STATS.len()
        + SPECTRAL_AXES.len() * (3 + band_count)
        + CORRELATION_PAIRS.len()
}

pub fn build_schema(band_count: usize) -> FeatureSchema {
    FeatureSchema::new(FEATURE_SCHEMA_VERSION, feature_names(band_count))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout() {
        let names = feature_names(3);
        assert_eq!(names.len(), 49);
        assert_eq!(names.len(), feature_count(3));
        assert_eq!(names[0], "x_mean");
        assert_eq!(names[27], "mag_mad");
        assert_eq!(names[28], "x_dominant_freq");
        assert_eq!(names[30], "x_band0_energy");
        assert_eq!(names[33], "x_spectral_entropy");
        assert_eq!(names[46..], ["corr_xy", "corr_yz", "corr_xz"]);
    }

    #[test]
    fn test_names_are_unique() {
        let mut names = feature_names(5);
        let total = names.len();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), total);
    }
}
