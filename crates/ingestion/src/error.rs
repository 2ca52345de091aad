//! Ingestion error types

use contracts::StreamId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestionError {
    /// Two sources registered for one stream
    #[error("a source for stream '{stream_id}' is already registered")]
    DuplicateStream { stream_id: StreamId },

    /// The pipeline sender was already handed out
    #[error("ingestion pipeline already started")]
    AlreadyStarted,

    /// A replay file line could not be decoded
    #[error("{path}:{line}: invalid sample record: {message}")]
    InvalidRecord {
        path: String,
        line: usize,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestionError>;
