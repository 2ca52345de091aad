//! Loading the pieces a command needs: blueprint, model and sample sources.

use std::path::{Path, PathBuf};

use classifier::ModelHandle;
use contracts::{RecognitionBlueprint, SampleSource};
use features::FeatureExtractor;
use ingestion::{ActivityProfile, ReplaySource, SyntheticConfig, SyntheticSource};
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// Where samples come from
#[derive(Debug, Clone)]
pub enum InputSource {
    /// Recorded JSON-lines file, one source per stream in the file
    Replay { path: PathBuf, speed: Option<f64> },
    /// Generated streams, `streams_per_profile` for each profile
    Synthetic {
        profiles: Vec<ActivityProfile>,
        streams_per_profile: usize,
        duration_s: u64,
        pace: Option<f64>,
        seed: u64,
    },
}

/// Load and validate the configuration, applying a model path override.
pub fn load_blueprint(path: &Path, model: Option<&Path>) -> Result<RecognitionBlueprint> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(path)?;
    if let Some(model) = model {
        info!(model = %model.display(), "Overriding model path from CLI");
        blueprint.classifier.model_path = model.to_path_buf();
    }
    Ok(blueprint)
}

/// Load the model and check it against the configured feature layout.
pub fn load_model(blueprint: &RecognitionBlueprint) -> Result<ModelHandle> {
    let handle = ModelHandle::load(&blueprint.classifier.model_path)?;
    let schema = FeatureExtractor::new(&blueprint.features).schema();
    handle.current().check_schema(&schema)?;

    info!(
        model_version = %handle.current().model_version(),
        features = schema.len(),
        "Model loaded"
    );
    Ok(handle)
}

/// Build the sample sources for an input selection.
pub fn build_sources(
    input: &InputSource,
    blueprint: &RecognitionBlueprint,
) -> Result<Vec<Box<dyn SampleSource>>> {
    let sources: Vec<Box<dyn SampleSource>> = match input {
        InputSource::Replay { path, speed } => ReplaySource::open_all(path, *speed)?
            .into_iter()
            .map(|source| Box::new(source) as Box<dyn SampleSource>)
            .collect(),
        InputSource::Synthetic {
            profiles,
            streams_per_profile,
            duration_s,
            pace,
            seed,
        } => {
            let rate_hz = blueprint.window.nominal_rate_hz;
            let total_samples = (*duration_s as f64 * rate_hz).round() as u64;
            let mut sources: Vec<Box<dyn SampleSource>> = Vec::new();

            for profile in profiles {
                for k in 0..*streams_per_profile {
                    let config = SyntheticConfig {
                        stream_id: format!("{}-{}", profile.name(), k).into(),
                        profile: *profile,
                        rate_hz,
                        total_samples: Some(total_samples),
                        pace: *pace,
                        seed: seed.wrapping_add(sources.len() as u64),
                        ..Default::default()
                    };
                    debug!(stream_id = %config.stream_id, profile = profile.name(), "synthetic stream");
                    sources.push(Box::new(SyntheticSource::new(config)));
                }
            }
            sources
        }
    };

    if sources.is_empty() {
        return Err(CliError::NoInput);
    }
    Ok(sources)
}
