//! Error types for CLI operations.

use classifier::ClassifierError;
use contracts::ContractError;
use ingestion::IngestionError;
use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration could not be parsed or failed validation
    #[error(transparent)]
    Config(#[from] ContractError),

    /// Model artifact missing, malformed or incompatible with the features
    #[error(transparent)]
    Model(#[from] ClassifierError),

    /// Input file unreadable or malformed
    #[error(transparent)]
    Input(#[from] IngestionError),

    /// Neither a replay file nor synthetic profiles were given
    #[error("No input selected: pass --input <file> or --synthetic <profiles>")]
    NoInput,
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }
}

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
