//! LogSink - logs each classification result via tracing

use contracts::{ClassificationResult, ContractError, ResultSink};
use tracing::{info, instrument};

/// Sink that logs result summaries
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_result(&self, result: &ClassificationResult) {
        info!(
            sink = %self.name,
            stream_id = %result.stream_id,
            start_us = result.start_us,
            end_us = result.end_us,
            label = %result.predicted_label,
            raw_label = %result.raw_label,
            confidence = format!("{:.3}", result.confidence),
            quality = result.quality.as_str(),
            intensity = format!("{:.3}", result.intensity),
            "Activity recognised"
        );
    }
}

impl ResultSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, result),
        fields(sink = %self.name, stream_id = %result.stream_id)
    )]
    async fn write(&mut self, result: &ClassificationResult) -> Result<(), ContractError> {
        self.log_result(result);
        self.written += 1;
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, results = self.written, "LogSink closed");
        Ok(())
    }
}
