//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ActivityLabel, RecognitionBlueprint};
use features::FeatureExtractor;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::InfoArgs;
use crate::pipeline::{load_blueprint, load_model};

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    window: WindowInfo,
    features: FeatureInfo,
    classifier: ClassifierInfo,
    service: ServiceInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
    /// Every label the pipeline can emit
    label_vocabulary: Vec<ActivityLabel>,
}

#[derive(Serialize)]
struct WindowInfo {
    duration_ms: u64,
    overlap_ratio: f64,
    nominal_rate_hz: f64,
    expected_samples: usize,
    gap_threshold_ms: f64,
    min_coverage: f64,
    resample: bool,
}

#[derive(Serialize)]
struct FeatureInfo {
    schema_version: u32,
    count: usize,
    bands: Vec<(f64, f64)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    names: Vec<String>,
}

#[derive(Serialize)]
struct ClassifierInfo {
    model_path: String,
    confidence_threshold: f64,
    /// None when the model could not be loaded
    #[serde(skip_serializing_if = "Option::is_none")]
    model_version: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<ActivityLabel>,
}

#[derive(Serialize)]
struct ServiceInfo {
    shards: usize,
    queue_capacity: usize,
    idle_timeout_s: u64,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    let blueprint = load_blueprint(&args.config, args.model.as_deref())
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&blueprint, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(blueprint: &RecognitionBlueprint, args: &InfoArgs) -> ConfigInfo {
    let schema = FeatureExtractor::new(&blueprint.features).schema();

    // Info stays useful when the model is missing or does not fit
    let (model_version, labels) = match load_model(blueprint) {
        Ok(handle) => {
            let model = handle.current();
            (
                Some(model.model_version().to_string()),
                model.labels().to_vec(),
            )
        }
        Err(e) => {
            warn!(error = %e, "Model unavailable");
            (None, Vec::new())
        }
    };

    let window = &blueprint.window;
    let sinks = if args.sinks {
        blueprint
            .sinks
            .iter()
            .map(|s| SinkInfo {
                name: s.name.clone(),
                sink_type: format!("{:?}", s.sink_type),
                queue_capacity: s.queue_capacity,
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        window: WindowInfo {
            duration_ms: window.duration_ms,
            overlap_ratio: window.overlap_ratio,
            nominal_rate_hz: window.nominal_rate_hz,
            expected_samples: window.expected_samples(),
            gap_threshold_ms: window.gap_threshold_us() as f64 / 1000.0,
            min_coverage: window.min_coverage,
            resample: window.resample,
        },
        features: FeatureInfo {
            schema_version: schema.version,
            count: schema.len(),
            bands: blueprint
                .features
                .bands
                .iter()
                .map(|b| (b.low_hz, b.high_hz))
                .collect(),
            names: if args.features {
                schema.names.clone()
            } else {
                Vec::new()
            },
        },
        classifier: ClassifierInfo {
            model_path: blueprint.classifier.model_path.display().to_string(),
            confidence_threshold: blueprint.classifier.confidence_threshold,
            model_version,
            labels,
        },
        service: ServiceInfo {
            shards: blueprint.service.shards,
            queue_capacity: blueprint.service.queue_capacity,
            idle_timeout_s: blueprint.service.idle_timeout_s,
        },
        sinks,
        label_vocabulary: ActivityLabel::ALL.to_vec(),
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║             Activity Recognizer Configuration                ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let w = &info.window;
    println!("🪟 Window");
    println!("   ├─ Version: {}", info.version);
    println!(
        "   ├─ Duration: {} ms ({} samples at {} Hz)",
        w.duration_ms, w.expected_samples, w.nominal_rate_hz
    );
    println!("   ├─ Overlap: {:.0}%", w.overlap_ratio * 100.0);
    println!("   ├─ Gap threshold: {:.1} ms", w.gap_threshold_ms);
    println!("   ├─ Min coverage: {:.0}%", w.min_coverage * 100.0);
    println!("   └─ Resample: {}", w.resample);

    let f = &info.features;
    println!("\n🧮 Features");
    println!("   ├─ Schema: v{} ({} features)", f.schema_version, f.count);
    let bands: Vec<String> = f
        .bands
        .iter()
        .map(|(low, high)| format!("{}-{} Hz", low, high))
        .collect();
    println!("   └─ Bands: {}", bands.join(", "));
    for name in &f.names {
        println!("        · {}", name);
    }

    let c = &info.classifier;
    println!("\n🧠 Classifier");
    println!("   ├─ Model: {}", c.model_path);
    match &c.model_version {
        Some(version) => println!("   ├─ Version: {}", version),
        None => println!("   ├─ Version: (model unavailable)"),
    }
    let labels: Vec<&str> = c.labels.iter().map(|l| l.as_str()).collect();
    println!("   ├─ Labels: {}", labels.join(", "));
    println!("   └─ Confidence threshold: {}", c.confidence_threshold);

    let s = &info.service;
    println!("\n⚙️  Service");
    println!("   ├─ Shards: {}", s.shards);
    println!("   ├─ Queue capacity: {}", s.queue_capacity);
    println!("   └─ Idle timeout: {} s", s.idle_timeout_s);

    if !info.sinks.is_empty() {
        println!("\n📤 Sinks ({})", info.sinks.len());
        for (i, sink) in info.sinks.iter().enumerate() {
            let prefix = if i + 1 == info.sinks.len() { "└─" } else { "├─" };
            println!(
                "   {} {} ({}, queue {})",
                prefix, sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    let vocabulary: Vec<&str> = info.label_vocabulary.iter().map(|l| l.as_str()).collect();
    println!("\n🏷️  Label vocabulary: {}", vocabulary.join(", "));
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_info_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("recognizer.toml");
        std::fs::write(&config, "[classifier]\nmodel_path = \"missing.json\"\n").unwrap();

        let args = InfoArgs {
            config: config.clone(),
            model: None,
            json: true,
            features: true,
            sinks: true,
        };
        let blueprint = load_blueprint(Path::new(&config), None).unwrap();
        let info = build_config_info(&blueprint, &args);

        assert!(info.classifier.model_version.is_none());
        assert_eq!(info.features.names.len(), info.features.count);
        assert_eq!(info.label_vocabulary.len(), ActivityLabel::ALL.len());
        assert_eq!(info.window.expected_samples, 256);
    }
}
