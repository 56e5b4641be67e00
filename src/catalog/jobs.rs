//! Submission contract for the external job engine.

use super::ids::{EntityId, EntityKind};
use super::payload::{AccessTokenRequest, ProductInfoRequest};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which flow produced a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFlow {
    TokenRequest,
    MetadataInfo,
}

impl fmt::Display for JobFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobFlow::TokenRequest => f.write_str("token_request"),
            JobFlow::MetadataInfo => f.write_str("metadata_info"),
        }
    }
}

/// Unit of work enqueued with the job engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkDescriptor {
    AccessTokens(AccessTokenRequest),
    ProductInfo(ProductInfoRequest),
}

/// Correlation tag attached to every submission so the engine can relate a
/// completed job back to its batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobMetadata {
    pub flow: JobFlow,
    pub kind: EntityKind,
    pub batch_index: usize,
    pub batch_count: usize,
    pub batch_len: usize,
    pub first_id: Option<EntityId>,
    pub last_id: Option<EntityId>,
}

/// Opaque handle returned by the engine for an enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(pub u64);

/// Accepts work for asynchronous execution. Failures of the submitted work
/// surface through the engine's own channel, never through this call.
pub trait JobEngine: Send + Sync {
    fn submit(&self, work: WorkDescriptor, metadata: JobMetadata) -> JobHandle;
}
