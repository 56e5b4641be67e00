//! Sync orchestration: run modes, identifier selection, change detection,
//! single-flight guarding, and the token/metadata pipeline built on top of
//! the dispatch primitives.

pub mod detector;
pub mod guard;
pub mod mode;
pub mod pipeline;
pub mod selector;

pub use detector::{detect, ChangeSet};
pub use guard::{InvocationKind, SingleFlight, SingleFlightGuard};
pub use mode::RunMode;
pub use pipeline::{Collaborators, SyncPipeline, SyncReport};
pub use selector::{select, Selection};
