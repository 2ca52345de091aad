//! Recognition metrics
//!
//! Thin wrappers over the `metrics` facade plus an in-memory aggregator
//! for end-of-run summaries.

use std::collections::BTreeMap;

use contracts::{ActivityLabel, ClassificationResult, QualityFlag, RejectionReason};
use metrics::{counter, histogram};

/// Record a raw sample handed to the pipeline
pub fn record_sample_received() {
    counter!("activity_samples_received_total").increment(1);
}

/// Record a sample that passed validation
pub fn record_sample_accepted() {
    counter!("activity_samples_accepted_total").increment(1);
}

/// Record a rejected or dropped sample
pub fn record_sample_rejected(reason: RejectionReason) {
    counter!("activity_samples_rejected_total", "reason" => reason.as_str()).increment(1);
}

/// Record an emitted window
pub fn record_window_emitted(quality: QualityFlag) {
    counter!("activity_windows_emitted_total", "quality" => quality.as_str()).increment(1);
}

/// Record a window too short for feature extraction
pub fn record_window_dropped() {
    counter!("activity_windows_dropped_total").increment(1);
}

/// Record feature extraction + classification time of one window
pub fn record_window_latency_ms(latency_ms: f64) {
    histogram!("activity_window_processing_ms").record(latency_ms);
}

/// Record a classification result
///
/// # Example
///
/// ```ignore
/// for result in orchestrator.ingest(sample)? {
///     observability::metrics::record_result(&result);
/// }
/// ```
pub fn record_result(result: &ClassificationResult) {
    counter!("activity_results_total", "label" => result.predicted_label.as_str()).increment(1);
    histogram!("activity_confidence").record(result.confidence);
    histogram!("activity_intensity").record(result.intensity);
}

/// Record a result discarded because the output consumer fell behind
pub fn record_result_dropped() {
    counter!("activity_results_dropped_total").increment(1);
}

/// Record a result delivered to (or rejected by) a sink
pub fn record_result_dispatched(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "activity_results_dispatched_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// Run-level result aggregator
///
/// Aggregates in memory so the CLI can print a summary at the end of a run.
#[derive(Debug, Clone, Default)]
pub struct RecognitionMetricsAggregator {
    /// Results seen
    pub total_results: u64,

    /// Results labelled `unknown`
    pub unknown_results: u64,

    /// Results computed from incomplete windows
    pub incomplete_results: u64,

    /// Results per predicted label
    pub label_counts: BTreeMap<ActivityLabel, u64>,

    /// Confidence statistics
    pub confidence_stats: RunningStats,

    /// Movement intensity statistics
    pub intensity_stats: RunningStats,
}

impl RecognitionMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, result: &ClassificationResult) {
        self.total_results += 1;
        if result.predicted_label == ActivityLabel::Unknown {
            self.unknown_results += 1;
        }
        if !result.quality.is_complete() {
            self.incomplete_results += 1;
        }
        *self.label_counts.entry(result.predicted_label).or_insert(0) += 1;
        self.confidence_stats.push(result.confidence);
        self.intensity_stats.push(result.intensity);
    }

    pub fn summary(&self) -> RecognitionSummary {
        RecognitionSummary {
            total_results: self.total_results,
            unknown_results: self.unknown_results,
            incomplete_results: self.incomplete_results,
            unknown_rate: percent(self.unknown_results, self.total_results),
            incomplete_rate: percent(self.incomplete_results, self.total_results),
            label_counts: self.label_counts.clone(),
            confidence: StatsSummary::from(&self.confidence_stats),
            intensity: StatsSummary::from(&self.intensity_stats),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

fn percent(part: u64, total: u64) -> f64 {
    if total > 0 {
        part as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

/// Summary of a run's results
#[derive(Debug, Clone, Default)]
pub struct RecognitionSummary {
    pub total_results: u64,
    pub unknown_results: u64,
    pub incomplete_results: u64,
    pub unknown_rate: f64,
    pub incomplete_rate: f64,
    pub label_counts: BTreeMap<ActivityLabel, u64>,
    pub confidence: StatsSummary,
    pub intensity: StatsSummary,
}

impl std::fmt::Display for RecognitionSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Recognition Summary ===")?;
        writeln!(f, "Total results: {}", self.total_results)?;
        writeln!(
            f,
            "Unknown: {} ({:.2}%)",
            self.unknown_results, self.unknown_rate
        )?;
        writeln!(
            f,
            "From incomplete windows: {} ({:.2}%)",
            self.incomplete_results, self.incomplete_rate
        )?;
        writeln!(f, "Confidence: {}", self.confidence)?;
        writeln!(f, "Intensity: {}", self.intensity)?;

        if !self.label_counts.is_empty() {
            writeln!(f, "Labels:")?;
            for (label, count) in &self.label_counts {
                writeln!(f, "  {}: {}", label, count)?;
            }
        }

        Ok(())
    }
}

/// Statistics summary
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online statistics (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(label: ActivityLabel, confidence: f64, quality: QualityFlag) -> ClassificationResult {
        ClassificationResult {
            stream_id: "s".into(),
            start_us: 0,
            end_us: 2_560_000,
            predicted_label: label,
            raw_label: label,
            confidence,
            per_class_scores: BTreeMap::new(),
            quality,
            model_version: "m".into(),
            intensity: 0.1,
        }
    }

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.min() - 1.0).abs() < 1e-10);
        assert!((stats.max() - 5.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
    }

    #[test]
    fn test_aggregator_update() {
        let mut aggregator = RecognitionMetricsAggregator::new();
        aggregator.update(&result(ActivityLabel::Sitting, 0.9, QualityFlag::Complete));
        aggregator.update(&result(ActivityLabel::Sitting, 0.8, QualityFlag::Incomplete));
        aggregator.update(&result(ActivityLabel::Unknown, 0.3, QualityFlag::Complete));

        assert_eq!(aggregator.total_results, 3);
        assert_eq!(aggregator.unknown_results, 1);
        assert_eq!(aggregator.incomplete_results, 1);
        assert_eq!(aggregator.label_counts.get(&ActivityLabel::Sitting), Some(&2));

        let summary = aggregator.summary();
        assert!((summary.confidence.mean - 2.0 / 3.0).abs() < 1e-10);
        assert!((summary.unknown_rate - 100.0 / 3.0).abs() < 1e-10);
    }

    #[test]
    fn test_summary_display() {
        let mut aggregator = RecognitionMetricsAggregator::new();
        aggregator.update(&result(ActivityLabel::Walking, 0.75, QualityFlag::Complete));
        let output = format!("{}", aggregator.summary());
        assert!(output.contains("Total results: 1"));
        assert!(output.contains("walking: 1"));
        assert!(output.contains("0.00%"));
    }

    #[test]
    fn test_empty_stats_display() {
        assert_eq!(format!("{}", StatsSummary::default()), "N/A");
    }
}
