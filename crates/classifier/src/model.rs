//! Model artifact loading and inference
//!
//! The artifact is a multinomial linear (softmax) model stored as JSON:
//!
//! ```json
//! {
//!   "model_version": "baseline-2024.1",
//!   "label_set_version": 1,
//!   "feature_schema": { "version": 1, "names": ["x_mean", "..."] },
//!   "labels": ["sitting", "walking"],
//!   "scaler": { "mean": { "x_mean": 0.1 }, "scale": { "x_mean": 2.0 } },
//!   "weights": { "sitting": { "x_mean": 0.5 } },
//!   "biases": { "walking": -2.0 }
//! }
//! ```
//!
//! Weights are sparse: features a label does not mention weigh zero. The
//! scaler is optional; missing entries mean 0 and scale 1.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use contracts::{ActivityLabel, FeatureSchema, FeatureVector, LABEL_SET_VERSION};
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::ClassifierError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModelArtifact {
    model_version: String,
    label_set_version: u32,
    feature_schema: FeatureSchema,
    labels: Vec<String>,
    #[serde(default)]
    scaler: Option<ScalerArtifact>,
    #[serde(default)]
    weights: HashMap<String, HashMap<String, f64>>,
    #[serde(default)]
    biases: HashMap<String, f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScalerArtifact {
    #[serde(default)]
    mean: HashMap<String, f64>,
    #[serde(default)]
    scale: HashMap<String, f64>,
}

/// Validated, densified model ready for inference.
#[derive(Debug, Clone)]
pub struct ActivityModel {
    model_version: String,
    source: String,
    schema: Arc<FeatureSchema>,
    labels: Vec<ActivityLabel>,
    mean: Vec<f64>,
    scale: Vec<f64>,
    /// `weights[label][feature]`
    weights: Vec<Vec<f64>>,
    biases: Vec<f64>,
}

impl ActivityModel {
    /// Load and validate a model artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let source = path.display().to_string();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClassifierError::model_load(&source, e.to_string()))?;
        let model = Self::from_json(&content, &source)?;
        info!(
            path = %source,
            model_version = %model.model_version,
            labels = model.labels.len(),
            features = model.schema.len(),
            "model loaded"
        );
        Ok(model)
    }

    /// Parse and validate an artifact; `source` names it in errors.
    pub fn from_json(content: &str, source: &str) -> Result<Self, ClassifierError> {
        let artifact: ModelArtifact = serde_json::from_str(content)
            .map_err(|e| ClassifierError::model_load(source, e.to_string()))?;
        Self::from_artifact(artifact, source)
    }

    fn from_artifact(artifact: ModelArtifact, source: &str) -> Result<Self, ClassifierError> {
        let fail = |message: String| ClassifierError::model_load(source, message);

        if artifact.label_set_version != LABEL_SET_VERSION {
            return Err(fail(format!(
                "label set version {} is not supported (expected {})",
                artifact.label_set_version, LABEL_SET_VERSION
            )));
        }

        let schema = artifact.feature_schema;
        if schema.is_empty() {
            return Err(fail("feature schema is empty".into()));
        }
        let index: HashMap<&str, usize> = schema
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();
        if index.len() != schema.len() {
            return Err(fail("feature schema has duplicate names".into()));
        }

        if artifact.labels.is_empty() {
            return Err(fail("model has no labels".into()));
        }
        let mut labels = Vec::with_capacity(artifact.labels.len());
        let mut seen = HashSet::new();
        for name in &artifact.labels {
            let label: ActivityLabel = name.parse().map_err(fail)?;
            if label == ActivityLabel::Unknown {
                return Err(fail("'unknown' is reserved and cannot be a model label".into()));
            }
            if !seen.insert(label) {
                return Err(fail(format!("duplicate label '{name}'")));
            }
            labels.push(label);
        }
        let label_index: HashMap<&str, usize> = artifact
            .labels
            .iter()
            .enumerate()
            .map(|(i, name)| (name.as_str(), i))
            .collect();

        let feature_at = |context: &str, name: &str| {
            index
                .get(name)
                .copied()
                .ok_or_else(|| fail(format!("{context} refers to unknown feature '{name}'")))
        };
        let label_at = |context: &str, name: &str| {
            label_index
                .get(name)
                .copied()
                .ok_or_else(|| fail(format!("{context} refers to unknown label '{name}'")))
        };
        let finite = |context: &str, value: f64| {
            if value.is_finite() {
                Ok(value)
            } else {
                Err(fail(format!("{context} is not finite")))
            }
        };

        let mut mean = vec![0.0; schema.len()];
        let mut scale = vec![1.0; schema.len()];
        if let Some(scaler) = artifact.scaler {
            for (name, value) in &scaler.mean {
                mean[feature_at("scaler.mean", name)?] = finite("scaler.mean", *value)?;
            }
            for (name, value) in &scaler.scale {
                let value = finite("scaler.scale", *value)?;
                if value == 0.0 {
                    return Err(fail(format!("scaler.scale for '{name}' is zero")));
                }
                scale[feature_at("scaler.scale", name)?] = value;
            }
        }

        let mut weights = vec![vec![0.0; schema.len()]; labels.len()];
        for (label, row) in &artifact.weights {
            let l = label_at("weights", label)?;
            for (feature, value) in row {
                weights[l][feature_at("weights", feature)?] = finite("weight", *value)?;
            }
        }

        let mut biases = vec![0.0; labels.len()];
        for (label, value) in &artifact.biases {
            biases[label_at("biases", label)?] = finite("bias", *value)?;
        }

        debug!(source, labels = labels.len(), "model artifact validated");

        Ok(Self {
            model_version: artifact.model_version,
            source: source.to_string(),
            schema: Arc::new(schema),
            labels,
            mean,
            scale,
            weights,
            biases,
        })
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Where the model was loaded from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Labels in model order
    pub fn labels(&self) -> &[ActivityLabel] {
        &self.labels
    }

    /// Startup compatibility check against the extractor's layout.
    pub fn check_schema(&self, schema: &FeatureSchema) -> Result<(), ClassifierError> {
        if schema.version != self.schema.version || schema.names != self.schema.names {
            return Err(self.mismatch(schema.version, schema.len()));
        }
        Ok(())
    }

    /// Per-vector input check: schema version and length.
    pub fn check_input(&self, features: &FeatureVector) -> Result<(), ClassifierError> {
        if features.schema.version != self.schema.version
            || features.values.len() != self.schema.len()
        {
            return Err(self.mismatch(features.schema.version, features.values.len()));
        }
        Ok(())
    }

    fn mismatch(&self, actual_version: u32, actual_len: usize) -> ClassifierError {
        ClassifierError::SchemaMismatch {
            expected_version: self.schema.version,
            expected_len: self.schema.len(),
            actual_version,
            actual_len,
        }
    }

    /// Class probabilities in label order. `values` must match the schema length.
    pub fn predict(&self, values: &[f64]) -> Vec<f64> {
        let standardized: Vec<f64> = values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(v, (m, s))| (v - m) / s)
            .collect();

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.biases)
            .map(|(row, bias)| {
                bias + row
                    .iter()
                    .zip(&standardized)
                    .map(|(w, x)| w * x)
                    .sum::<f64>()
            })
            .collect();

        softmax(&logits)
    }
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return vec![1.0 / logits.len().max(1) as f64; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Two-feature test model: sitting when still, walking/running as `mag_std` grows.
    pub(crate) const TEST_MODEL: &str = r#"{
        "model_version": "test-1",
        "label_set_version": 1,
        "feature_schema": { "version": 1, "names": ["mag_mean", "mag_std"] },
        "labels": ["sitting", "walking", "running"],
        "weights": {
            "sitting": { "mag_std": -5.0 },
            "walking": { "mag_std": 3.0 },
            "running": { "mag_std": 5.0 }
        },
        "biases": { "sitting": 2.0, "running": -2.0 }
    }"#;

    fn load_err(json: &str) -> String {
        match ActivityModel::from_json(json, "test") {
            Err(ClassifierError::ModelLoad { message, .. }) => message,
            other => panic!("expected ModelLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_load_valid_model() {
        let model = ActivityModel::from_json(TEST_MODEL, "test").unwrap();
        assert_eq!(model.model_version(), "test-1");
        assert_eq!(
            model.labels(),
            &[ActivityLabel::Sitting, ActivityLabel::Walking, ActivityLabel::Running]
        );
        assert_eq!(model.schema().len(), 2);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TEST_MODEL.as_bytes()).unwrap();
        let model = ActivityModel::load(file.path()).unwrap();
        assert_eq!(model.source(), file.path().display().to_string());
    }

    #[test]
    fn test_missing_file_is_model_load() {
        let err = ActivityModel::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, ClassifierError::ModelLoad { .. }));
    }

    #[test]
    fn test_rejects_bad_artifacts() {
        assert!(load_err(&TEST_MODEL.replace("\"label_set_version\": 1", "\"label_set_version\": 9"))
            .contains("label set version"));
        assert!(load_err(&TEST_MODEL.replace("\"running\"]", "\"unknown\"]")).contains("reserved"));
        assert!(load_err(&TEST_MODEL.replace("\"running\"]", "\"walking\"]")).contains("duplicate"));
        assert!(load_err(&TEST_MODEL.replace("\"running\"]", "\"swimming\"]")).contains("swimming"));
        assert!(load_err(&TEST_MODEL.replace("{ \"mag_std\": 3.0 }", "{ \"steps\": 3.0 }"))
            .contains("unknown feature 'steps'"));
        assert!(load_err(&TEST_MODEL.replace("\"sitting\": 2.0", "\"lying\": 2.0"))
            .contains("unknown label 'lying'"));
        assert!(!load_err("{ not json").is_empty());
    }

    #[test]
    fn test_rejects_zero_scale() {
        let json = TEST_MODEL.replace(
            "\"weights\"",
            "\"scaler\": { \"mean\": {}, \"scale\": { \"mag_std\": 0.0 } }, \"weights\"",
        );
        assert!(load_err(&json).contains("zero"));
    }

    #[test]
    fn test_predict_sums_to_one() {
        let model = ActivityModel::from_json(TEST_MODEL, "test").unwrap();
        let probs = model.predict(&[9.8, 0.0]);
        assert!((probs.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        assert!(probs[0] > probs[1] && probs[0] > probs[2]);
    }

    #[test]
    fn test_scaler_is_applied() {
        let json = TEST_MODEL.replace(
            "\"weights\"",
            "\"scaler\": { \"mean\": { \"mag_std\": 1.0 }, \"scale\": { \"mag_std\": 0.5 } }, \"weights\"",
        );
        let scaled = ActivityModel::from_json(&json, "test").unwrap();
        let plain = ActivityModel::from_json(TEST_MODEL, "test").unwrap();
        // (1.5 - 1.0) / 0.5 = 1.0
        assert_eq!(scaled.predict(&[0.0, 1.5]), plain.predict(&[0.0, 1.0]));
    }

    #[test]
    fn test_softmax_is_stable_for_large_logits() {
        let probs = softmax(&[1000.0, 1000.0, -1000.0]);
        assert!((probs[0] - 0.5).abs() < 1e-12);
        assert!(probs[2] < 1e-12);
    }

    #[test]
    fn test_check_schema() {
        let model = ActivityModel::from_json(TEST_MODEL, "test").unwrap();
        let same = FeatureSchema::new(1, vec!["mag_mean".into(), "mag_std".into()]);
        assert!(model.check_schema(&same).is_ok());

        let reordered = FeatureSchema::new(1, vec!["mag_std".into(), "mag_mean".into()]);
        assert!(model.check_schema(&reordered).is_err());

        let newer = FeatureSchema::new(2, same.names.clone());
        assert_eq!(
            model.check_schema(&newer),
            Err(ClassifierError::SchemaMismatch {
                expected_version: 1,
                expected_len: 2,
                actual_version: 2,
                actual_len: 2,
            })
        );
    }
}
