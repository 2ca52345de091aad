//! Configuration parsing
//!
//! TOML is the primary format, JSON is accepted as well.

use contracts::{ContractError, RecognitionBlueprint};

/// Configuration file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Infer the format from a file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

pub fn parse_toml(content: &str) -> Result<RecognitionBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse_json(content: &str) -> Result<RecognitionBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<RecognitionBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{OutOfRangePolicy, SinkType};

    #[test]
    fn test_parse_toml_applies_defaults() {
        let content = r#"
[classifier]
model_path = "models/activity_model.json"
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.window.duration_ms, 2560);
        assert_eq!(bp.window.overlap_ratio, 0.5);
        assert_eq!(bp.features.bands.len(), 3);
        assert_eq!(bp.validator.out_of_range, OutOfRangePolicy::Clamp);
        assert_eq!(bp.classifier.confidence_threshold, 0.4);
        assert_eq!(bp.service.shards, 4);
        assert!(bp.sinks.is_empty());
    }

    #[test]
    fn test_parse_toml_full() {
        let content = r#"
[validator]
accel_bound_ms2 = 78.4
out_of_range = "reject"
max_future_skew_ms = 500

[window]
duration_ms = 5120
overlap_ratio = 0.25
nominal_rate_hz = 50.0
gap_threshold_ms = 200
resample = true

[features]
min_samples = 64
bands = [
    { low_hz = 0.5, high_hz = 2.0 },
    { low_hz = 2.0, high_hz = 6.0 },
]

[classifier]
model_path = "m.json"
confidence_threshold = 0.55

[service]
shards = 2
queue_capacity = 64

[[sinks]]
name = "out"
sink_type = "json_lines"
params = { path = "results.jsonl" }
"#;
        let bp = parse_toml(content).unwrap();
        assert_eq!(bp.validator.out_of_range, OutOfRangePolicy::Reject);
        assert_eq!(bp.validator.max_future_skew_ms, Some(500));
        assert_eq!(bp.window.gap_threshold_ms, Some(200));
        assert!(bp.window.resample);
        assert_eq!(bp.features.bands[1].high_hz, 6.0);
        assert_eq!(bp.sinks[0].sink_type, SinkType::JsonLines);
        assert_eq!(bp.sinks[0].params.get("path").unwrap(), "results.jsonl");
    }

    #[test]
    fn test_parse_json_minimal() {
        let content = r#"{ "classifier": { "model_path": "m.json" }, "service": { "shards": 1 } }"#;
        let bp = parse_json(content).unwrap();
        assert_eq!(bp.service.shards, 1);
    }

    #[test]
    fn test_missing_classifier_is_parse_error() {
        let err = parse_toml("[window]\nduration_ms = 1000\n").unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ConfigFormat::from_extension("TOML"), Some(ConfigFormat::Toml));
        assert_eq!(ConfigFormat::from_extension("json"), Some(ConfigFormat::Json));
        assert_eq!(ConfigFormat::from_extension("yaml"), None);
    }
}
