//! Feature extraction errors

use contracts::{ContractError, StreamId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    /// Window holds fewer samples than the extractor needs
    #[error("window of stream '{stream_id}' has {samples} samples, {required} required")]
    InsufficientSamples {
        stream_id: StreamId,
        samples: usize,
        required: usize,
    },
}

impl From<FeatureError> for ContractError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InsufficientSamples {
                stream_id,
                samples,
                required,
            } => ContractError::InsufficientSamples {
                stream_id: stream_id.to_string(),
                samples,
                required,
            },
        }
    }
}
