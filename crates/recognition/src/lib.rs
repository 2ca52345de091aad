//! # Recognition
//!
//! Turns raw acceleration samples into activity labels.
//!
//! - [`RecognitionOrchestrator`]: validation → windowing → features →
//!   classification with per-stream state and counters
//! - [`RecognitionService`]: sharded, single-writer-per-stream async front
//! - [`summarize`]: activity segments, patterns and intensity of a result series
//!
//! ## Usage Example
//!
//! ```ignore
//! use recognition::{OrchestratorConfig, RecognitionOrchestrator};
//!
//! let mut orchestrator = RecognitionOrchestrator::new(
//!     OrchestratorConfig::from_blueprint(&blueprint),
//!     ModelHandle::load(&blueprint.classifier.model_path)?,
//!     Arc::new(CounterRegistry::new()),
//! )?;
//!
//! for result in orchestrator.ingest_reading("wrist", t_us, x, y, z)? {
//!     println!("{} {:.2}", result.predicted_label, result.confidence);
//! }
//! ```

mod error;
mod orchestrator;
mod service;
mod summary;

pub use error::{ServiceError, StreamFault};
pub use orchestrator::{OrchestratorConfig, RecognitionOrchestrator};
pub use service::RecognitionService;
pub use summary::{
    summarize, ActivityPattern, ActivitySegment, ActivitySummary, IntensityMetrics, PatternKind,
    ACTIVE_PATTERN_MIN_S, MIXED_PATTERN_MIN_LABELS, MIXED_PATTERN_MIN_SEGMENTS,
    SEDENTARY_PATTERN_MIN_S,
};
