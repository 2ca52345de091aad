//! Windows emitted by the windowing engine

use serde::{Deserialize, Serialize};

use crate::{Sample, StreamId};

/// Whether a window (and everything derived from it) had enough data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityFlag {
    #[default]
    Complete,
    Incomplete,
}

impl QualityFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityFlag::Complete => "complete",
            QualityFlag::Incomplete => "incomplete",
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, QualityFlag::Complete)
    }
}

/// What caused a window to be emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// The window span was covered by incoming samples
    Full,
    /// An inter-sample gap above the threshold force-closed it
    Gap,
    /// The stream was closed or flushed
    Flush,
    /// The per-stream buffer hit its sample limit
    Overflow,
}

/// A fixed-duration slice of one stream.
///
/// Samples are ordered and lie in `[start_us, start_us + duration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub stream_id: StreamId,
    pub start_us: i64,
    pub end_us: i64,
    pub samples: Vec<Sample>,
    /// Fraction of the expected sample count present, in `0..=1`
    pub coverage: f64,
    pub quality: QualityFlag,
    pub close_reason: CloseReason,
}

impl Window {
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_us(&self) -> i64 {
        self.end_us.saturating_sub(self.start_us)
    }
}
