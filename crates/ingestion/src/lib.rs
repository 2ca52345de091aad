//! # Ingestion
//!
//! Sample intake for the recognition pipeline.
//!
//! Responsibilities:
//! - Validate raw accelerometer readings ([`SampleValidator`])
//! - Register sample sources (recorded files, synthetic generators)
//! - Backpressure management and drop policy
//! - Fan samples in to downstream via async-channel
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{IngestionPipeline, ReplaySource};
//!
//! let mut pipeline = IngestionPipeline::new(1024);
//! for source in ReplaySource::open_all(path, None)? {
//!     pipeline.register_source(Box::new(source), None)?;
//! }
//! let rx = pipeline.take_receiver().unwrap();
//! pipeline.start_all()?;
//! while let Ok(sample) = rx.recv().await {
//!     // hand to the recognition service
//! }
//! ```

mod config;
mod error;
mod pipeline;
mod replay;
mod source_adapter;
mod synthetic;
mod validator;

pub use config::{BackpressureConfig, IngestionMetrics, MetricsSnapshot, OverflowPolicy};
pub use error::{IngestionError, Result};
pub use pipeline::IngestionPipeline;
pub use replay::{read_samples, ReplaySource};
pub use source_adapter::SourceAdapter;
pub use synthetic::{ActivityProfile, SyntheticConfig, SyntheticSignal, SyntheticSource, GRAVITY};
pub use validator::SampleValidator;
