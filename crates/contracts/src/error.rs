//! Layered error definitions
//!
//! Categorized by source: config / model / pipeline / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Model Errors =====
    /// Model artifact could not be loaded or is inconsistent
    #[error("model load error for '{path}': {message}")]
    ModelLoad { path: String, message: String },

    /// Feature vector does not match the model input signature
    #[error(
        "schema mismatch: model expects v{expected_version} with {expected_len} features, \
         got v{actual_version} with {actual_len}"
    )]
    SchemaMismatch {
        expected_version: u32,
        expected_len: usize,
        actual_version: u32,
        actual_len: usize,
    },

    // ===== Pipeline Errors =====
    /// Window too short for feature extraction
    #[error("insufficient samples for stream '{stream_id}': {samples} < {required}")]
    InsufficientSamples {
        stream_id: String,
        samples: usize,
        required: usize,
    },

    /// Stream was marked unhealthy and refuses further samples
    #[error("stream '{stream_id}' is unhealthy")]
    StreamUnhealthy { stream_id: String },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create model load error
    pub fn model_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
