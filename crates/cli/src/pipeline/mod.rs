//! Pipeline orchestration module.

mod runner;
mod setup;
mod stats;

pub use runner::{Pipeline, PipelineConfig};
pub use setup::{load_blueprint, load_model, InputSource};
pub use stats::PipelineStats;
