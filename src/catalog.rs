//! Catalog-side vocabulary: entity identifiers, the payloads handed to the job
//! engine, and the collaborator traits (store, token cache, job engine) the
//! sync pipeline is wired against.

pub mod ids;
pub mod jobs;
pub mod memory;
pub mod payload;
pub mod store;

pub use ids::{ChangeCounter, EntityId, EntityKind};
pub use jobs::{JobEngine, JobFlow, JobHandle, JobMetadata, WorkDescriptor};
pub use memory::{
    InMemoryCatalogStore, InMemoryTokenCache, RecordingJobEngine, StaticLoadMetrics, SubmittedJob,
};
pub use payload::{AccessTokenRequest, MetadataResponse, ProductInfoRequest, ProductRequest};
pub use store::{CatalogStore, StoreFuture, TokenCache};
