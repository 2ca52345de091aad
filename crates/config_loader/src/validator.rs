//! Configuration validation
//!
//! Rules:
//! - field bounds declared on the blueprint (`validator` derive)
//! - model path present
//! - frequency bands ordered and below Nyquist
//! - buffer and feature sample counts consistent with the window geometry
//! - sink names present and unique

use std::collections::HashSet;

use contracts::{ContractError, RecognitionBlueprint};
use validator::Validate;

/// Validate a blueprint, returning the first error encountered.
pub fn validate(blueprint: &RecognitionBlueprint) -> Result<(), ContractError> {
    validate_field_bounds(blueprint)?;
    validate_classifier(blueprint)?;
    validate_bands(blueprint)?;
    validate_window_geometry(blueprint)?;
    validate_sinks(blueprint)?;
    Ok(())
}

fn validate_field_bounds(blueprint: &RecognitionBlueprint) -> Result<(), ContractError> {
    blueprint.validate().map_err(|errors| {
        let field = errors
            .errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_else(|| "blueprint".to_string());
        ContractError::config_validation(field, errors.to_string())
    })
}

fn validate_classifier(blueprint: &RecognitionBlueprint) -> Result<(), ContractError> {
    if blueprint.classifier.model_path.as_os_str().is_empty() {
        return Err(ContractError::config_validation(
            "classifier.model_path",
            "model_path cannot be empty",
        ));
    }
    Ok(())
}

fn validate_bands(blueprint: &RecognitionBlueprint) -> Result<(), ContractError> {
    let nyquist = blueprint.window.nominal_rate_hz / 2.0;
    if blueprint.features.bands.is_empty() {
        return Err(ContractError::config_validation(
            "features.bands",
            "at least one frequency band is required",
        ));
    }
    for (idx, band) in blueprint.features.bands.iter().enumerate() {
        if band.low_hz >= band.high_hz {
            return Err(ContractError::config_validation(
                format!("features.bands[{idx}]"),
                format!(
                    "low_hz ({}) must be < high_hz ({})",
                    band.low_hz, band.high_hz
                ),
            ));
        }
        if band.high_hz > nyquist {
            return Err(ContractError::config_validation(
                format!("features.bands[{idx}].high_hz"),
                format!(
                    "high_hz ({}) exceeds Nyquist frequency ({nyquist}) of the nominal rate",
                    band.high_hz
                ),
            ));
        }
    }
    Ok(())
}

fn validate_window_geometry(blueprint: &RecognitionBlueprint) -> Result<(), ContractError> {
    let window = &blueprint.window;
    let expected = window.expected_samples();

    if window.max_samples < expected {
        return Err(ContractError::config_validation(
            "window.max_samples",
            format!(
                "max_samples ({}) must hold a full window of {expected} samples",
                window.max_samples
            ),
        ));
    }

    if blueprint.features.min_samples > expected {
        return Err(ContractError::config_validation(
            "features.min_samples",
            format!(
                "min_samples ({}) exceeds the {expected} samples of a full window",
                blueprint.features.min_samples
            ),
        ));
    }

    if (window.gap_threshold_us() as f64) < window.period_us() {
        return Err(ContractError::config_validation(
            "window.gap_threshold_ms",
            format!(
                "gap threshold ({} us) is shorter than the nominal period ({:.0} us)",
                window.gap_threshold_us(),
                window.period_us()
            ),
        ));
    }

    Ok(())
}

fn validate_sinks(blueprint: &RecognitionBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in blueprint.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].name"),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{idx}].queue_capacity"),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}
