//! Recognition errors

use classifier::ClassifierError;
use contracts::{ContractError, StreamId};
use thiserror::Error;

/// Stream-level failure surfaced to the caller of `ingest` / `close_stream`.
///
/// Sample rejections and short windows never show up here; they are counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamFault {
    /// The feature vectors did not match the model; the stream is now unhealthy
    ///
    /// No window of the failing call was classified.
    #[error("stream '{stream_id}': {source}")]
    SchemaMismatch {
        stream_id: StreamId,
        #[source]
        source: ClassifierError,
    },

    /// An earlier schema mismatch disabled this stream
    #[error("stream '{stream_id}' is unhealthy")]
    Unhealthy { stream_id: StreamId },
}

impl StreamFault {
    pub fn stream_id(&self) -> &StreamId {
        match self {
            StreamFault::SchemaMismatch { stream_id, .. } | StreamFault::Unhealthy { stream_id } => {
                stream_id
            }
        }
    }
}

impl From<StreamFault> for ContractError {
    fn from(fault: StreamFault) -> Self {
        match fault {
            StreamFault::SchemaMismatch { source, .. } => source.into(),
            StreamFault::Unhealthy { stream_id } => ContractError::StreamUnhealthy {
                stream_id: stream_id.to_string(),
            },
        }
    }
}

/// Errors of the sharded service
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The shard worker is gone (service shut down)
    #[error("recognition service is shut down")]
    Closed,

    #[error(transparent)]
    Fault(#[from] StreamFault),
}
