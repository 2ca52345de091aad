//! # Classifier
//!
//! Inference over a pre-trained, versioned activity model.
//!
//! - [`ActivityModel`]: JSON artifact loading and validation, softmax inference
//! - [`ModelHandle`]: shared, atomically reloadable model
//! - [`ClassifierAdapter`]: feature vector → [`contracts::ClassificationResult`]
//!   with confidence thresholding

mod adapter;
mod error;
mod handle;
mod model;

pub use adapter::ClassifierAdapter;
pub use error::ClassifierError;
pub use handle::{ModelHandle, ModelSnapshot};
pub use model::{softmax, ActivityModel};
