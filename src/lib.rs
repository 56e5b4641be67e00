pub mod catalog;
pub mod dispatch;
pub mod runtime;
pub mod sync;

pub use catalog::{
    AccessTokenRequest, CatalogStore, ChangeCounter, EntityId, EntityKind, InMemoryCatalogStore,
    InMemoryTokenCache, JobEngine, JobFlow, JobHandle, JobMetadata, MetadataResponse,
    ProductInfoRequest, ProductRequest, RecordingJobEngine, StaticLoadMetrics, StoreFuture,
    SubmittedJob, TokenCache, WorkDescriptor,
};
pub use dispatch::{
    split, BackpressureGate, DispatchSummary, LoadMetrics, LoadSnapshot, Pacer, RequestBatch,
};
pub use runtime::config::{SyncConfig, SyncConfigBuilder, SyncConfigParams};
pub use runtime::error::SyncError;
pub use runtime::runner::SyncRunner;
pub use runtime::telemetry::{init_tracing, Telemetry, TelemetrySnapshot, DEFAULT_LOG_FILTER};
pub use sync::{
    detect, select, ChangeSet, Collaborators, InvocationKind, RunMode, Selection, SingleFlight,
    SingleFlightGuard, SyncPipeline, SyncReport,
};
