//! SampleSource trait - producer of raw acceleration samples
//!
//! Decouples where samples come from (recorded files, synthetic generators,
//! an upstream API layer) from the ingestion fan-in that consumes them.

use std::sync::Arc;

use crate::{RawSample, StreamId};

/// Callback invoked for every produced sample.
pub type SampleCallback = Arc<dyn Fn(RawSample) + Send + Sync>;

/// Raw sample producer.
///
/// # Example
///
/// ```ignore
/// let source: Box<dyn SampleSource> = Box::new(ReplaySource::open(path)?);
/// source.listen(Arc::new(|sample| println!("{:?}", sample.timestamp_us)));
/// source.stop();
/// ```
pub trait SampleSource: Send + Sync {
    /// Stream this source feeds
    fn stream_id(&self) -> &StreamId;

    /// Start producing; repeated calls while listening are ignored.
    fn listen(&self, callback: SampleCallback);

    /// Stop producing
    fn stop(&self);

    fn is_listening(&self) -> bool;

    /// True once a finite source has delivered its last sample
    fn is_exhausted(&self) -> bool {
        false
    }
}
