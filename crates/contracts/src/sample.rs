//! Acceleration samples and rejection reasons
//!
//! `RawSample` is what the caller hands in (any field may be missing);
//! `Sample` is what survives validation. Units: timestamps in microseconds,
//! axes in m/s².

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::StreamId;

/// Unvalidated reading as delivered by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub stream_id: StreamId,
    #[serde(default)]
    pub timestamp_us: Option<i64>,
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
    #[serde(default)]
    pub z: Option<f64>,
}

impl RawSample {
    /// Fully populated raw sample.
    pub fn new(stream_id: impl Into<StreamId>, timestamp_us: i64, x: f64, y: f64, z: f64) -> Self {
        Self {
            stream_id: stream_id.into(),
            timestamp_us: Some(timestamp_us),
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }
}

/// Validated tri-axial acceleration reading.
///
/// Within a stream, accepted samples have strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub stream_id: StreamId,
    pub timestamp_us: i64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// Why a raw sample was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    MissingField,
    NonFinite,
    OutOfRange,
    FutureTimestamp,
    NonmonotonicTimestamp,
    DuplicateTimestamp,
    BackpressureDrop,
    StreamUnhealthy,
}

impl RejectionReason {
    pub const ALL: [RejectionReason; 8] = [
        RejectionReason::MissingField,
        RejectionReason::NonFinite,
        RejectionReason::OutOfRange,
        RejectionReason::FutureTimestamp,
        RejectionReason::NonmonotonicTimestamp,
        RejectionReason::DuplicateTimestamp,
        RejectionReason::BackpressureDrop,
        RejectionReason::StreamUnhealthy,
    ];

    /// Stable label used for metrics and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::MissingField => "missing_field",
            RejectionReason::NonFinite => "non_finite",
            RejectionReason::OutOfRange => "out_of_range",
            RejectionReason::FutureTimestamp => "future_timestamp",
            RejectionReason::NonmonotonicTimestamp => "nonmonotonic_timestamp",
            RejectionReason::DuplicateTimestamp => "duplicate_timestamp",
            RejectionReason::BackpressureDrop => "backpressure_drop",
            RejectionReason::StreamUnhealthy => "stream_unhealthy",
        }
    }

    /// Position in [`RejectionReason::ALL`], used for per-reason counter slots.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rejected sample: the reason plus a human readable detail.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub detail: String,
}

impl Rejection {
    pub fn new(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.detail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_sample_missing_fields_deserialize_as_none() {
        let raw: RawSample =
            serde_json::from_str(r#"{"stream_id":"s1","timestamp_us":10,"x":1.0}"#).unwrap();
        assert_eq!(raw.timestamp_us, Some(10));
        assert_eq!(raw.y, None);
        assert_eq!(raw.z, None);
    }

    #[test]
    fn test_reason_index_matches_all_order() {
        for (i, reason) in RejectionReason::ALL.iter().enumerate() {
            assert_eq!(reason.index(), i);
        }
    }

    #[test]
    fn test_reason_serde_name_matches_label() {
        let json = serde_json::to_string(&RejectionReason::DuplicateTimestamp).unwrap();
        assert_eq!(json, format!("\"{}\"", RejectionReason::DuplicateTimestamp.as_str()));
    }
}
