//! # Features
//!
//! Fixed-length feature vectors from accelerometer windows.
//!
//! Per window: time-domain statistics of `x, y, z` and the magnitude,
//! FFT-based spectral features of each axis and cross-axis correlations.
//! The layout is described by a versioned [`contracts::FeatureSchema`].

mod error;
mod extractor;
mod schema;
mod spectral;
mod time_domain;

pub use error::FeatureError;
pub use extractor::FeatureExtractor;
pub use schema::{build_schema, feature_count, feature_names};
pub use spectral::{spectral_features, SpectralFeatures};
pub use time_domain::{channel_stats, correlation, ChannelStats};
