//! Shared model handle with atomic reload

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::error::ClassifierError;
use crate::model::ActivityModel;

/// Process-wide handle to the current model.
///
/// Readers clone the inner `Arc` and run inference without holding the lock;
/// a reload only takes the write lock for the pointer swap. Hot readers keep
/// a [`ModelSnapshot`] and touch the lock only after a swap.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    inner: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    current: RwLock<Arc<ActivityModel>>,
    /// Bumped under the write lock on every swap
    generation: AtomicU64,
}

/// A reader's own reference to the model, valid until the next swap.
#[derive(Debug, Clone)]
pub struct ModelSnapshot {
    generation: u64,
    model: Arc<ActivityModel>,
}

impl ModelSnapshot {
    pub fn model(&self) -> &Arc<ActivityModel> {
        &self.model
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl ModelHandle {
    pub fn new(model: ActivityModel) -> Self {
        Self {
            inner: Arc::new(Shared {
                current: RwLock::new(Arc::new(model)),
                generation: AtomicU64::new(0),
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        Ok(Self::new(ActivityModel::load(path)?))
    }

    /// The model in effect right now.
    #[inline]
    pub fn current(&self) -> Arc<ActivityModel> {
        self.inner.current.read().clone()
    }

    /// Number of swaps so far.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> ModelSnapshot {
        let current = self.inner.current.read();
        ModelSnapshot {
            generation: self.inner.generation.load(Ordering::Acquire),
            model: current.clone(),
        }
    }

    /// Bring `snapshot` up to date. Lock-free unless a swap happened since.
    #[inline]
    pub fn refresh(&self, snapshot: &mut ModelSnapshot) {
        if self.generation() != snapshot.generation {
            *snapshot = self.snapshot();
        }
    }

    /// Load a new artifact and swap it in. On failure the current model stays.
    pub fn reload(&self, path: &Path) -> Result<Arc<ActivityModel>, ClassifierError> {
        match ActivityModel::load(path) {
            Ok(model) => {
                metrics::counter!("activity_model_reloads_total", "status" => "ok").increment(1);
                let previous = self.replace(model);
                info!(
                    previous = %previous.model_version(),
                    current = %self.current().model_version(),
                    "model reloaded"
                );
                Ok(previous)
            }
            Err(err) => {
                metrics::counter!("activity_model_reloads_total", "status" => "failed")
                    .increment(1);
                warn!(path = %path.display(), error = %err, "model reload failed, keeping current model");
                Err(err)
            }
        }
    }

    /// Swap in a model, returning the previous one.
    pub fn replace(&self, model: ActivityModel) -> Arc<ActivityModel> {
        let mut current = self.inner.current.write();
        self.inner.generation.fetch_add(1, Ordering::Release);
        std::mem::replace(&mut *current, Arc::new(model))
    }
}
