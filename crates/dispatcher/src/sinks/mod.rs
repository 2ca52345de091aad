//! Sink implementations
//!
//! Contains LogSink and JsonLinesSink.

pub(crate) mod json_lines;
mod log;

pub use self::json_lines::{JsonLinesSink, JsonLinesTarget};
pub use self::log::LogSink;
