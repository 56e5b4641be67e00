//! Batch dispatch primitives: splitting identifier lists into bounded
//! batches, evaluating the backpressure gate, and pacing submissions.

pub mod gate;
pub mod pacer;
pub mod splitter;

pub use gate::{BackpressureGate, LoadMetrics, LoadSnapshot};
pub use pacer::{DispatchSummary, Pacer};
pub use splitter::{split, RequestBatch};
