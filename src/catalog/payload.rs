//! Request payloads handed to the job engine and the metadata response shape
//! the host feeds back once a metadata-only job completes.

use super::ids::{ChangeCounter, EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// Asks the catalog for access tokens. The pipeline never emits one with both
/// lists empty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessTokenRequest {
    pub app_ids: Vec<EntityId>,
    pub package_ids: Vec<EntityId>,
}

impl AccessTokenRequest {
    pub fn for_kind(kind: EntityKind, ids: Vec<EntityId>) -> Self {
        match kind {
            EntityKind::App => Self {
                app_ids: ids,
                package_ids: Vec::new(),
            },
            EntityKind::Package => Self {
                app_ids: Vec::new(),
                package_ids: ids,
            },
        }
    }

    pub fn len(&self) -> usize {
        self.app_ids.len() + self.package_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.app_ids.is_empty() && self.package_ids.is_empty()
    }
}

/// One entry of a product-info request, with the cached access token if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRequest {
    pub id: EntityId,
    pub access_token: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductInfoRequest {
    pub app_requests: Vec<ProductRequest>,
    pub package_requests: Vec<ProductRequest>,
    pub metadata_only: bool,
}

impl ProductInfoRequest {
    pub fn metadata_only(kind: EntityKind, requests: Vec<ProductRequest>) -> Self {
        let (app_requests, package_requests) = match kind {
            EntityKind::App => (requests, Vec::new()),
            EntityKind::Package => (Vec::new(), requests),
        };
        Self {
            app_requests,
            package_requests,
            metadata_only: true,
        }
    }
}

/// Fresh change counters returned by a metadata-only product-info job.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub apps: Vec<(EntityId, ChangeCounter)>,
    pub packages: Vec<(EntityId, ChangeCounter)>,
}

impl MetadataResponse {
    pub fn counters(&self, kind: EntityKind) -> &[(EntityId, ChangeCounter)] {
        match kind {
            EntityKind::App => &self.apps,
            EntityKind::Package => &self.packages,
        }
    }
}
