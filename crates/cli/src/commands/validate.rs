//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{ActivityLabel, RecognitionBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::pipeline::{load_blueprint, load_model};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    model_version: String,
    feature_count: usize,
    labels: Vec<ActivityLabel>,
    expected_window_samples: usize,
    shards: usize,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();
    let invalid = |error: String| ValidationResult {
        valid: false,
        config_path: config_path.clone(),
        error: Some(error),
        warnings: Vec::new(),
        summary: None,
    };

    let blueprint = match load_blueprint(&args.config, args.model.as_deref()) {
        Ok(blueprint) => blueprint,
        Err(e) => return invalid(e.to_string()),
    };
    let model = match load_model(&blueprint) {
        Ok(model) => model.current(),
        Err(e) => return invalid(e.to_string()),
    };

    let warnings = collect_warnings(&blueprint, model.labels());
    ValidationResult {
        valid: true,
        config_path: config_path.clone(),
        error: None,
        warnings,
        summary: Some(ConfigSummary {
            version: format!("{:?}", blueprint.version),
            model_version: model.model_version().to_string(),
            feature_count: model.schema().len(),
            labels: model.labels().to_vec(),
            expected_window_samples: blueprint.window.expected_samples(),
            shards: blueprint.service.shards,
            sink_count: blueprint.sinks.len(),
        }),
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RecognitionBlueprint, labels: &[ActivityLabel]) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - results will only be counted".to_string());
    }

    if blueprint.classifier.confidence_threshold <= 0.0 {
        warnings.push(
            "classifier.confidence_threshold is 0 - results are never reported as unknown"
                .to_string(),
        );
    }

    if blueprint.window.overlap_ratio == 0.0 {
        warnings.push("window.overlap_ratio is 0 - windows do not overlap".to_string());
    }

    if blueprint.validator.max_future_skew_ms.is_some() {
        warnings.push(
            "validator.max_future_skew_ms is set - recorded files with old timestamps are fine, \
             but device clocks ahead of this host will be rejected"
                .to_string(),
        );
    }

    if !labels.iter().any(|l| l.is_active()) {
        warnings.push("Model has no active labels - active minutes will always be 0".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Model: {}", summary.model_version);
            println!("  Features: {}", summary.feature_count);
            let labels: Vec<&str> = summary.labels.iter().map(|l| l.as_str()).collect();
            println!("  Labels: {}", labels.join(", "));
            println!("  Samples per window: {}", summary.expected_window_samples);
            println!("  Shards: {}", summary.shards);
            println!("  Sinks: {}", summary.sink_count);
        }

        if !result.warnings.is_empty() {
            println!("\n⚠ Warnings:");
            for warning in &result.warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
