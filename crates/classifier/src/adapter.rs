//! Feature vector → classification result

use std::collections::BTreeMap;

use contracts::{ActivityLabel, ClassificationResult, FeatureVector};
use tracing::trace;

use crate::error::ClassifierError;
use crate::handle::ModelHandle;
use crate::model::ActivityModel;

/// Standard gravity, used to normalise movement intensity.
const GRAVITY: f64 = 9.80665;

/// Feature carrying the magnitude's standard deviation
const INTENSITY_FEATURE: &str = "mag_std";

/// Runs the current model and applies the confidence threshold.
#[derive(Debug, Clone)]
pub struct ClassifierAdapter {
    model: ModelHandle,
    confidence_threshold: f64,
}

impl ClassifierAdapter {
    pub fn new(model: ModelHandle, confidence_threshold: f64) -> Self {
        Self {
            model,
            confidence_threshold,
        }
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }

    pub fn confidence_threshold(&self) -> f64 {
        self.confidence_threshold
    }

    /// Classify one feature vector.
    ///
    /// # Errors
    /// [`ClassifierError::SchemaMismatch`] if the vector's schema version or
    /// length differs from the model's input signature.
    pub fn classify(&self, features: &FeatureVector) -> Result<ClassificationResult, ClassifierError> {
        self.classify_with(&self.model.current(), features)
    }

    /// [`classify`](Self::classify) against a model snapshot the caller took,
    /// so a batch of windows sees one model even across a reload.
    pub fn classify_with(
        &self,
        model: &ActivityModel,
        features: &FeatureVector,
    ) -> Result<ClassificationResult, ClassifierError> {
        model.check_input(features)?;

        let probabilities = model.predict(&features.values);
        let labels = model.labels();

        // First label wins ties.
        let (best, confidence) = probabilities.iter().copied().enumerate().fold(
            (0, f64::NEG_INFINITY),
            |best, (i, p)| if p > best.1 { (i, p) } else { best },
        );
        let raw_label = labels[best];
        let predicted_label = if confidence < self.confidence_threshold {
            ActivityLabel::Unknown
        } else {
            raw_label
        };

        let per_class_scores: BTreeMap<ActivityLabel, f64> =
            labels.iter().copied().zip(probabilities.iter().copied()).collect();

        let intensity = features
            .get(INTENSITY_FEATURE)
            .map_or(0.0, |std| (std / GRAVITY).clamp(0.0, 1.0));

        trace!(
            stream_id = %features.stream_id,
            start_us = features.start_us,
            %raw_label,
            %predicted_label,
            confidence,
            "window classified"
        );

        Ok(ClassificationResult {
            stream_id: features.stream_id.clone(),
            start_us: features.start_us,
            end_us: features.end_us,
            predicted_label,
            raw_label,
            confidence,
            per_class_scores,
            quality: features.quality,
            model_version: model.model_version().to_string(),
            intensity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tests::TEST_MODEL;
    use contracts::{FeatureSchema, QualityFlag};
    use std::sync::Arc;

    fn adapter(threshold: f64) -> ClassifierAdapter {
        let model = ActivityModel::from_json(TEST_MODEL, "test").unwrap();
        ClassifierAdapter::new(ModelHandle::new(model), threshold)
    }

    fn vector(mag_std: f64) -> FeatureVector {
        FeatureVector {
            stream_id: "s".into(),
            start_us: 0,
            end_us: 2_560_000,
            schema: Arc::new(FeatureSchema::new(
                1,
                vec!["mag_mean".into(), "mag_std".into()],
            )),
            values: vec![9.8, mag_std],
            quality: QualityFlag::Complete,
        }
    }

    #[test]
    fn test_still_window_is_sitting() {
        let result = adapter(0.4).classify(&vector(0.0)).unwrap();
        assert_eq!(result.predicted_label, ActivityLabel::Sitting);
        assert_eq!(result.raw_label, ActivityLabel::Sitting);
        assert!(result.confidence >= 0.4);
        assert_eq!(result.model_version, "test-1");
        assert_eq!(result.per_class_scores.len(), 3);
        assert!((result.per_class_scores.values().sum::<f64>() - 1.0).abs() < 1e-12);
        assert_eq!(result.intensity, 0.0);
    }

    #[test]
    fn test_vigorous_window_is_running() {
        let result = adapter(0.4).classify(&vector(4.0)).unwrap();
        assert_eq!(result.raw_label, ActivityLabel::Running);
        assert!(result.intensity > 0.4);
    }

    #[test]
    fn test_low_confidence_becomes_unknown() {
        // Walking and running are close at mag_std = 1; nothing reaches 0.9.
        let result = adapter(0.9).classify(&vector(1.0)).unwrap();
        assert_eq!(result.predicted_label, ActivityLabel::Unknown);
        assert_ne!(result.raw_label, ActivityLabel::Unknown);
        assert!(result.confidence < 0.9);
    }

    #[test]
    fn test_schema_mismatch() {
        let mut features = vector(0.0);
        features.values.push(1.0);
        let err = adapter(0.4).classify(&features).unwrap_err();
        assert_eq!(
            err,
            ClassifierError::SchemaMismatch {
                expected_version: 1,
                expected_len: 2,
                actual_version: 1,
                actual_len: 3,
            }
        );
    }

    #[test]
    fn test_version_mismatch() {
        let mut features = vector(0.0);
        features.schema = Arc::new(FeatureSchema::new(2, features.schema.names.clone()));
        assert!(matches!(
            adapter(0.4).classify(&features),
            Err(ClassifierError::SchemaMismatch { actual_version: 2, .. })
        ));
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let adapter = adapter(0.4);
        let snapshot = adapter.model().current();
        let newer = TEST_MODEL.replacen("\"version\": 1", "\"version\": 2", 1);
        adapter
            .model()
            .replace(ActivityModel::from_json(&newer, "test").unwrap());

        assert!(adapter.classify_with(&snapshot, &vector(0.0)).is_ok());
        assert!(adapter.classify(&vector(0.0)).is_err());
    }

    #[test]
    fn test_quality_passes_through() {
        let mut features = vector(0.0);
        features.quality = QualityFlag::Incomplete;
        let result = adapter(0.4).classify(&features).unwrap();
        assert_eq!(result.quality, QualityFlag::Incomplete);
    }
}
