//! # Windowing
//!
//! Per-stream sliding windows over validated samples.
//!
//! Responsibilities:
//! - Bounded per-stream buffering (ring buffer)
//! - Fixed-duration overlapping windows with coverage-based quality
//! - Gap and overflow handling, flush on stream close
//! - Optional linear resampling onto the nominal grid
//!
//! ## Usage Example
//!
//! ```ignore
//! use windowing::WindowingEngine;
//!
//! let mut engine = WindowingEngine::new(WindowConfig::default());
//! for window in engine.push(sample) {
//!     // extract features
//! }
//! if let Some(last) = engine.flush(&stream_id) {
//!     // partial window at stream close
//! }
//! ```

mod buffer;
mod engine;
mod resample;

pub use buffer::SampleBuffer;
pub use engine::{WindowerStats, WindowingEngine};
pub use resample::Resampler;
