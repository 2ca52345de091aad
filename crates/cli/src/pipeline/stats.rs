//! Pipeline statistics and metrics.

use std::time::Duration;

use contracts::StreamId;
use dispatcher::MetricsSnapshot;
use observability::{CounterSnapshot, RecognitionMetricsAggregator};
use recognition::ActivitySummary;

/// Statistics from a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Samples taken off the ingestion channel
    pub samples_received: u64,

    /// Samples dropped at ingestion because the channel was full
    pub samples_dropped: u64,

    /// Results handed to the dispatcher
    pub results_emitted: u64,

    /// Schema or health failures reported by the recognition service
    pub stream_faults: u64,

    /// Total duration of the pipeline run
    pub duration: Duration,

    /// Number of sample sources that were registered
    pub active_streams: usize,

    /// Run-level result statistics
    pub recognition: RecognitionMetricsAggregator,

    /// Final counters of every stream
    pub stream_counters: Vec<(StreamId, CounterSnapshot)>,

    /// Final delivery counters of every sink
    pub sink_metrics: Vec<(String, MetricsSnapshot)>,

    /// Segments and patterns per stream (only with `--activity-summary`)
    pub activity: Vec<(StreamId, ActivitySummary)>,
}

impl PipelineStats {
    /// Sample throughput
    pub fn samples_per_sec(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.samples_received as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Rejected samples as a percentage of received samples, over all streams
    pub fn rejection_rate(&self) -> f64 {
        let (received, rejected) = self
            .stream_counters
            .iter()
            .fold((0u64, 0u64), |(received, rejected), (_, c)| {
                (received + c.samples_received, rejected + c.total_rejected())
            });
        if received > 0 {
            rejected as f64 / received as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Print detailed summary
    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Pipeline Statistics                       ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Samples received: {}", self.samples_received);
        println!("   ├─ Samples dropped at ingestion: {}", self.samples_dropped);
        println!("   ├─ Samples/s: {:.1}", self.samples_per_sec());
        println!("   ├─ Rejection rate: {:.2}%", self.rejection_rate());
        println!("   ├─ Results: {}", self.results_emitted);
        println!("   ├─ Stream faults: {}", self.stream_faults);
        println!("   └─ Streams: {}", self.active_streams);

        println!("\n📈 {}", self.recognition.summary());

        if !self.stream_counters.is_empty() {
            println!("🧭 Streams");
            for (i, (stream_id, c)) in self.stream_counters.iter().enumerate() {
                let prefix = if i + 1 == self.stream_counters.len() {
                    "└─"
                } else {
                    "├─"
                };
                println!(
                    "   {} {}: accepted {}/{}, windows {} ({} incomplete, {} dropped), gaps {}, results {} ({} unknown)",
                    prefix,
                    stream_id,
                    c.samples_accepted,
                    c.samples_received,
                    c.windows_emitted,
                    c.windows_incomplete,
                    c.windows_dropped,
                    c.gap_events,
                    c.results_emitted,
                    c.results_unknown
                );
                for (reason, count) in c.rejections() {
                    println!("   │    rejected {}: {}", reason.as_str(), count);
                }
            }
        }

        if !self.sink_metrics.is_empty() {
            println!("\n📤 Sinks");
            for (name, metrics) in &self.sink_metrics {
                println!("   ├─ {}: {}", name, metrics);
            }
        }

        for (stream_id, summary) in &self.activity {
            print_activity(stream_id, summary);
        }

        println!();
    }
}

fn print_activity(stream_id: &StreamId, summary: &ActivitySummary) {
    println!("\n🏃 Activity of {}", stream_id);
    println!("   ├─ Dominant: {}", summary.dominant_activity);
    let m = &summary.metrics;
    println!(
        "   ├─ Intensity: avg {:.3}, peak {:.3}, consistency {:.2}",
        m.average_intensity, m.peak_intensity, m.movement_consistency
    );
    println!(
        "   ├─ Active minutes: {:.1} of {:.1}",
        m.active_minutes,
        m.total_duration_s / 60.0
    );
    for segment in &summary.segments {
        println!(
            "   │  {:>10.1}s .. {:>10.1}s  {:<9} ({} windows, conf {:.2})",
            segment.start_us as f64 / 1e6,
            segment.end_us as f64 / 1e6,
            segment.label.as_str(),
            segment.windows,
            segment.mean_confidence
        );
    }
    for pattern in &summary.patterns {
        println!(
            "   └─ Pattern {:?}: {:.0}s over {} segments",
            pattern.kind,
            pattern.total_duration_s,
            pattern.segments.len()
        );
    }
}
