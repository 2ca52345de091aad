//! Activity segments, patterns and intensity over a stream's results
//!
//! Consecutive results with the same predicted label form a segment. A
//! segment ends where the next one starts; the last ends at its last
//! window's end, so segments tile the covered time without overlap.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{ActivityLabel, ClassificationResult};
use serde::{Deserialize, Serialize};

/// Sedentary time needed for the `sedentary` pattern
pub const SEDENTARY_PATTERN_MIN_S: f64 = 30.0 * 60.0;
/// Active time needed for the `active` pattern
pub const ACTIVE_PATTERN_MIN_S: f64 = 10.0 * 60.0;
/// The `mixed` pattern needs more segments than this
pub const MIXED_PATTERN_MIN_SEGMENTS: usize = 5;
/// ...and at least this many distinct labels
pub const MIXED_PATTERN_MIN_LABELS: usize = 3;

/// Run of consecutive windows with the same label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySegment {
    pub label: ActivityLabel,
    pub start_us: i64,
    pub end_us: i64,
    pub mean_confidence: f64,
    pub windows: usize,
}

impl ActivitySegment {
    pub fn duration_s(&self) -> f64 {
        self.end_us.saturating_sub(self.start_us).max(0) as f64 / 1e6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// Long periods of sitting, standing or lying
    Sedentary,
    /// Sustained walking, running or cycling
    Active,
    /// Frequent transitions between several activities
    Mixed,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Sedentary => "sedentary",
            PatternKind::Active => "active",
            PatternKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pattern detected across segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPattern {
    pub kind: PatternKind,
    pub total_duration_s: f64,
    /// Indices into [`ActivitySummary::segments`]
    pub segments: Vec<usize>,
}

/// Movement intensity over the summarised results
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntensityMetrics {
    pub average_intensity: f64,
    pub peak_intensity: f64,
    /// `1 - cv` of the per-window intensity, clamped to `0..=1`
    pub movement_consistency: f64,
    /// Time spent in active segments
    pub active_minutes: f64,
    pub total_duration_s: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub segments: Vec<ActivitySegment>,
    /// Label with the longest total duration (`unknown` without results)
    pub dominant_activity: ActivityLabel,
    pub duration_by_label: BTreeMap<ActivityLabel, f64>,
    pub patterns: Vec<ActivityPattern>,
    pub metrics: IntensityMetrics,
}

/// Summarise the results of one stream.
///
/// Results need not be sorted; they are ordered by window start first.
pub fn summarize(results: &[ClassificationResult]) -> ActivitySummary {
    let mut ordered: Vec<&ClassificationResult> = results.iter().collect();
    ordered.sort_by_key(|r| r.start_us);

    let segments = build_segments(&ordered);

    let mut duration_by_label: BTreeMap<ActivityLabel, f64> = BTreeMap::new();
    for segment in &segments {
        *duration_by_label.entry(segment.label).or_insert(0.0) += segment.duration_s();
    }

    // Strict comparison keeps the first label on ties.
    let dominant_activity = duration_by_label
        .iter()
        .fold(None, |best: Option<(ActivityLabel, f64)>, (label, duration)| match best {
            Some((_, top)) if *duration <= top => best,
            _ => Some((*label, *duration)),
        })
        .map_or(ActivityLabel::Unknown, |(label, _)| label);

    let patterns = detect_patterns(&segments);
    let metrics = intensity_metrics(&ordered, &segments);

    ActivitySummary {
        segments,
        dominant_activity,
        duration_by_label,
        patterns,
        metrics,
    }
}

fn build_segments(ordered: &[&ClassificationResult]) -> Vec<ActivitySegment> {
    let mut segments: Vec<ActivitySegment> = Vec::new();
    let mut confidence_sum = 0.0;

    for result in ordered {
        match segments.last_mut() {
            Some(current) if current.label == result.predicted_label => {
                current.end_us = current.end_us.max(result.end_us);
                current.windows += 1;
                confidence_sum += result.confidence;
                current.mean_confidence = confidence_sum / current.windows as f64;
            }
            _ => {
                if let Some(previous) = segments.last_mut() {
                    previous.end_us = result.start_us.max(previous.start_us);
                }
                confidence_sum = result.confidence;
                segments.push(ActivitySegment {
                    label: result.predicted_label,
                    start_us: result.start_us,
                    end_us: result.end_us,
                    mean_confidence: result.confidence,
                    windows: 1,
                });
            }
        }
    }

    segments
}

fn detect_patterns(segments: &[ActivitySegment]) -> Vec<ActivityPattern> {
    let mut patterns = Vec::new();

    let group = |kind: PatternKind, select: fn(&ActivityLabel) -> bool, min_s: f64| {
        let indices: Vec<usize> = segments
            .iter()
            .enumerate()
            .filter(|(_, s)| select(&s.label))
            .map(|(i, _)| i)
            .collect();
        let total: f64 = indices.iter().map(|&i| segments[i].duration_s()).sum();
        (total > min_s).then_some(ActivityPattern {
            kind,
            total_duration_s: total,
            segments: indices,
        })
    };

    patterns.extend(group(
        PatternKind::Sedentary,
        ActivityLabel::is_sedentary,
        SEDENTARY_PATTERN_MIN_S,
    ));
    patterns.extend(group(
        PatternKind::Active,
        ActivityLabel::is_active,
        ACTIVE_PATTERN_MIN_S,
    ));

    if segments.len() > MIXED_PATTERN_MIN_SEGMENTS {
        let distinct: std::collections::BTreeSet<ActivityLabel> =
            segments.iter().map(|s| s.label).collect();
        if distinct.len() >= MIXED_PATTERN_MIN_LABELS {
            patterns.push(ActivityPattern {
                kind: PatternKind::Mixed,
                total_duration_s: segments.iter().map(ActivitySegment::duration_s).sum(),
                segments: (0..segments.len()).collect(),
            });
        }
    }

    patterns
}

fn intensity_metrics(
    ordered: &[&ClassificationResult],
    segments: &[ActivitySegment],
) -> IntensityMetrics {
    if ordered.is_empty() {
        return IntensityMetrics::default();
    }

    let n = ordered.len() as f64;
    let mean = ordered.iter().map(|r| r.intensity).sum::<f64>() / n;
    let peak = ordered.iter().map(|r| r.intensity).fold(0.0, f64::max);
    let variance = ordered
        .iter()
        .map(|r| (r.intensity - mean).powi(2))
        .sum::<f64>()
        / n;
    let movement_consistency = if mean > f64::EPSILON {
        (1.0 - variance.sqrt() / mean).clamp(0.0, 1.0)
    } else {
        1.0
    };

    let active_s: f64 = segments
        .iter()
        .filter(|s| s.label.is_active())
        .map(ActivitySegment::duration_s)
        .sum();

    let first = ordered.first().map_or(0, |r| r.start_us);
    let last = ordered.iter().map(|r| r.end_us).max().unwrap_or(first);

    IntensityMetrics {
        average_intensity: mean,
        peak_intensity: peak,
        movement_consistency,
        active_minutes: active_s / 60.0,
        total_duration_s: last.saturating_sub(first).max(0) as f64 / 1e6,
    }
}
