//! Activity labels and classification results

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::{QualityFlag, StreamId};

/// Version of the closed label enumeration below.
pub const LABEL_SET_VERSION: u32 = 1;

/// Activity classes understood by the pipeline.
///
/// `Unknown` is never predicted by a model; it replaces the top label when
/// confidence falls below the configured threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLabel {
    Walking,
    Running,
    Standing,
    Sitting,
    Lying,
    Cycling,
    Falling,
    Unknown,
}

impl ActivityLabel {
    pub const ALL: [ActivityLabel; 8] = [
        ActivityLabel::Walking,
        ActivityLabel::Running,
        ActivityLabel::Standing,
        ActivityLabel::Sitting,
        ActivityLabel::Lying,
        ActivityLabel::Cycling,
        ActivityLabel::Falling,
        ActivityLabel::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityLabel::Walking => "walking",
            ActivityLabel::Running => "running",
            ActivityLabel::Standing => "standing",
            ActivityLabel::Sitting => "sitting",
            ActivityLabel::Lying => "lying",
            ActivityLabel::Cycling => "cycling",
            ActivityLabel::Falling => "falling",
            ActivityLabel::Unknown => "unknown",
        }
    }

    /// Low-movement postures.
    pub fn is_sedentary(&self) -> bool {
        matches!(
            self,
            ActivityLabel::Sitting | ActivityLabel::Standing | ActivityLabel::Lying
        )
    }

    /// Sustained locomotion.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ActivityLabel::Walking | ActivityLabel::Running | ActivityLabel::Cycling
        )
    }
}

impl fmt::Display for ActivityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActivityLabel::ALL
            .iter()
            .copied()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| format!("unknown activity label '{s}'"))
    }
}

/// Outcome of classifying one window. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub stream_id: StreamId,
    pub start_us: i64,
    pub end_us: i64,
    /// Label after confidence thresholding
    pub predicted_label: ActivityLabel,
    /// Arg-max label before thresholding
    pub raw_label: ActivityLabel,
    pub confidence: f64,
    pub per_class_scores: BTreeMap<ActivityLabel, f64>,
    pub quality: QualityFlag,
    pub model_version: String,
    /// Dynamic acceleration of the window in g (magnitude std / 1 g), clamped to `0..=1`
    #[serde(default)]
    pub intensity: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_round_trips_through_str() {
        for label in ActivityLabel::ALL {
            assert_eq!(label.as_str().parse::<ActivityLabel>().unwrap(), label);
        }
        assert!("jumping".parse::<ActivityLabel>().is_err());
    }

    #[test]
    fn test_label_groups() {
        assert!(ActivityLabel::Lying.is_sedentary());
        assert!(!ActivityLabel::Lying.is_active());
        assert!(ActivityLabel::Cycling.is_active());
        assert!(!ActivityLabel::Unknown.is_sedentary());
        assert!(!ActivityLabel::Falling.is_active());
    }

    #[test]
    fn test_scores_serialize_with_snake_case_keys() {
        let mut scores = BTreeMap::new();
        scores.insert(ActivityLabel::Sitting, 0.75);
        let json = serde_json::to_string(&scores).unwrap();
        assert_eq!(json, r#"{"sitting":0.75}"#);
    }
}
