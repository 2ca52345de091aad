//! Feature schema and feature vectors

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{QualityFlag, StreamId};

/// Current version of the feature layout produced by the extractor.
///
/// Bump whenever the set, order or meaning of features changes.
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Ordered, versioned list of feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub names: Vec<String>,
}

impl FeatureSchema {
    pub fn new(version: u32, names: Vec<String>) -> Self {
        Self { version, names }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

/// Fixed-length feature vector computed from one window.
///
/// `values[i]` is the feature named `schema.names[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub stream_id: StreamId,
    pub start_us: i64,
    pub end_us: i64,
    pub schema: Arc<FeatureSchema>,
    pub values: Vec<f64>,
    pub quality: QualityFlag,
}

impl FeatureVector {
    /// Value of a named feature, if the schema has it.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.schema
            .index_of(name)
            .and_then(|i| self.values.get(i).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_name() {
        let schema = Arc::new(FeatureSchema::new(
            FEATURE_SCHEMA_VERSION,
            vec!["x_mean".into(), "mag_std".into()],
        ));
        let vector = FeatureVector {
            stream_id: "s".into(),
            start_us: 0,
            end_us: 10,
            schema,
            values: vec![0.5, 1.5],
            quality: QualityFlag::Complete,
        };
        assert_eq!(vector.get("mag_std"), Some(1.5));
        assert_eq!(vector.get("z_mean"), None);
    }

    #[test]
    fn test_vector_serializes_with_its_schema() {
        let vector = FeatureVector {
            stream_id: "hip".into(),
            start_us: 1_280_000,
            end_us: 3_840_000,
            schema: Arc::new(FeatureSchema::new(FEATURE_SCHEMA_VERSION, vec!["mag_std".into()])),
            values: vec![0.25],
            quality: QualityFlag::Incomplete,
        };
        let json = serde_json::to_value(&vector).unwrap();
        assert_eq!(json["schema"]["version"], FEATURE_SCHEMA_VERSION);
        assert_eq!(json["schema"]["names"][0], "mag_std");

        let back: FeatureVector = serde_json::from_value(json).unwrap();
        assert_eq!(back, vector);
    }
}
