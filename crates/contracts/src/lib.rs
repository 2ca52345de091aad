//! # Contracts
//!
//! Frozen interface contracts shared by every crate of the activity
//! recognition pipeline: data model, label set, configuration blueprint,
//! errors and the sink/source traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Sample timestamps are integer microseconds on the device clock
//! - Within a stream, accepted timestamps strictly increase

mod activity;
mod blueprint;
mod error;
mod feature;
mod sample;
mod sample_source;
mod sink;
mod stream_id;
mod window;

pub use activity::*;
pub use blueprint::*;
pub use error::*;
pub use feature::*;
pub use sample::*;
pub use sample_source::{SampleCallback, SampleSource};
pub use sink::*;
pub use stream_id::StreamId;
pub use window::*;
