//! # Dispatcher
//!
//! Result fan-out.
//!
//! Responsibilities:
//! - Consume `ClassificationResult`s
//! - Fan-out to every configured sink
//! - Isolate slow sinks so they never block recognition

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{ClassificationResult, ResultSink};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{JsonLinesSink, JsonLinesTarget, LogSink};
