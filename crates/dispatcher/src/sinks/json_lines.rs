//! JsonLinesSink - one JSON object per classification result
//!
//! Each line is the serialized result plus a `written_at` RFC 3339 stamp.
//! Writes to a file (`params.path`, appended) or to stdout (`path` unset or `-`).

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use contracts::{ClassificationResult, ContractError, ResultSink};
use serde::Serialize;
use tracing::{debug, instrument};

/// Where the lines go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonLinesTarget {
    Stdout,
    File(PathBuf),
}

impl JsonLinesTarget {
    /// Target from the sink's params map
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        match params.get("path").map(String::as_str) {
            None | Some("") | Some("-") => JsonLinesTarget::Stdout,
            Some(path) => JsonLinesTarget::File(PathBuf::from(path)),
        }
    }
}

#[derive(Serialize)]
struct ResultRecord<'a> {
    written_at: String,
    #[serde(flatten)]
    result: &'a ClassificationResult,
}

/// Sink that appends results as JSON lines
pub struct JsonLinesSink {
    name: String,
    writer: BufWriter<Box<dyn Write + Send>>,
    lines: u64,
}

impl JsonLinesSink {
    pub fn new(name: impl Into<String>, target: JsonLinesTarget) -> io::Result<Self> {
        let out: Box<dyn Write + Send> = match &target {
            JsonLinesTarget::Stdout => Box::new(io::stdout()),
            JsonLinesTarget::File(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)?;
                }
                let file: File = OpenOptions::new().create(true).append(true).open(path)?;
                Box::new(file)
            }
        };
        let name = name.into();
        debug!(sink = %name, ?target, "JsonLinesSink opened");

        Ok(Self {
            name,
            writer: BufWriter::new(out),
            lines: 0,
        })
    }

    /// Create from params map (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> io::Result<Self> {
        Self::new(name, JsonLinesTarget::from_params(params))
    }

    fn write_line(&mut self, result: &ClassificationResult) -> io::Result<()> {
        let record = ResultRecord {
            written_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            result,
        };
        serde_json::to_writer(&mut self.writer, &record)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.writer.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }
}

impl ResultSink for JsonLinesSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        level = "trace",
        name = "json_lines_sink_write",
        skip(self, result),
        fields(sink = %self.name, stream_id = %result.stream_id)
    )]
    async fn write(&mut self, result: &ClassificationResult) -> Result<(), ContractError> {
        self.write_line(result)
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        self.writer
            .flush()
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "json_lines_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.flush().await?;
        debug!(sink = %self.name, lines = self.lines, "JsonLinesSink closed");
        Ok(())
    }
}
