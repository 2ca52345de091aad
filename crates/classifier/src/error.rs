//! Classifier error types

use contracts::ContractError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassifierError {
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

    /// Model artifact missing, malformed or inconsistent
    #[error("model load error for '{path}': {message}")]
    ModelLoad { path: String, message: String },
}

impl ClassifierError {
    pub fn model_load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<ClassifierError> for ContractError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::SchemaMismatch {
                expected_version,
                expected_len,
                actual_version,
                actual_len,
            } => ContractError::SchemaMismatch {
                expected_version,
                expected_len,
                actual_version,
                actual_len,
            },
            ClassifierError::ModelLoad { path, message } => {
                ContractError::ModelLoad { path, message }
            }
        }
    }
}
