//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{load_blueprint, InputSource, Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    let blueprint = load_blueprint(&args.config, args.model.as_deref())
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        model = %blueprint.classifier.model_path.display(),
        window_ms = blueprint.window.duration_ms,
        overlap = blueprint.window.overlap_ratio,
        shards = blueprint.service.shards,
        sinks = blueprint.sinks.len(),
        "Configuration loaded"
    );

    let input = input_from_args(args)?;

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint, &input);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        input,
        max_results: (args.max_results > 0).then_some(args.max_results),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        activity_summary: args.activity_summary,
    });

    info!("Starting pipeline...");

    tokio::select! {
        result = pipeline.run() => {
            let stats = result.context("Pipeline execution failed")?;
            info!(
                samples = stats.samples_received,
                results = stats.results_emitted,
                duration_secs = stats.duration.as_secs_f64(),
                "Pipeline completed successfully"
            );
            stats.print_summary();
        }
        signal = shutdown_signal() => {
            signal?;
            warn!("Received shutdown signal, stopping pipeline...");
        }
    }

    info!("Activity Recognizer finished");
    Ok(())
}

fn input_from_args(args: &RunArgs) -> Result<InputSource, CliError> {
    if let Some(path) = &args.input {
        return Ok(InputSource::Replay {
            path: path.clone(),
            speed: args.replay_speed,
        });
    }
    if args.synthetic.is_empty() {
        return Err(CliError::NoInput);
    }
    Ok(InputSource::Synthetic {
        profiles: args.synthetic.clone(),
        streams_per_profile: args.streams_per_profile.max(1),
        duration_s: args.duration,
        pace: args.pace,
        seed: args.seed,
    })
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() -> Result<()> {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to install Ctrl+C handler")
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .context("Failed to install SIGTERM handler")?
            .recv()
            .await;
        Ok::<(), anyhow::Error>(())
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<Result<()>>();

    tokio::select! {
        result = ctrl_c => result,
        result = terminate => result,
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::RecognitionBlueprint, input: &InputSource) {
    println!("\n=== Configuration Summary ===\n");
    println!("Model: {}", blueprint.classifier.model_path.display());
    println!(
        "Window: {} ms, overlap {:.2}, nominal {} Hz",
        blueprint.window.duration_ms,
        blueprint.window.overlap_ratio,
        blueprint.window.nominal_rate_hz
    );
    println!(
        "Service: {} shards, queue {}, idle timeout {} s",
        blueprint.service.shards, blueprint.service.queue_capacity, blueprint.service.idle_timeout_s
    );

    match input {
        InputSource::Replay { path, speed } => {
            println!("\nInput: replay {} (speed {:?})", path.display(), speed);
        }
        InputSource::Synthetic {
            profiles,
            streams_per_profile,
            duration_s,
            ..
        } => {
            let names: Vec<&str> = profiles.iter().map(|p| p.name()).collect();
            println!(
                "\nInput: synthetic [{}] x{} for {} s",
                names.join(", "),
                streams_per_profile,
                duration_s
            );
        }
    }

    if !blueprint.sinks.is_empty() {
        println!("\nSinks ({}):", blueprint.sinks.len());
        for sink in &blueprint.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}
