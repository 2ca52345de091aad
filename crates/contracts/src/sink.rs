//! ResultSink trait - Dispatcher output interface

use crate::{ClassificationResult, ContractError};

/// Destination for classification results
///
/// All sink implementations must implement this trait.
#[trait_variant::make(ResultSink: Send)]
pub trait LocalResultSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Write one classification result
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn write(&mut self, result: &ClassificationResult) -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;
}
