//! Read-side contracts for persisted catalog state and the cached token set.

use super::ids::{ChangeCounter, EntityId, EntityKind};
use anyhow::Result;
use futures::future::BoxFuture;
use std::collections::HashMap;

pub type StoreFuture<'a, T> = BoxFuture<'a, Result<T>>;

/// Queries against the relational mirror. Every method is read-only.
pub trait CatalogStore: Send + Sync {
    /// Highest persisted identifier of `kind`, or `0` when none exist.
    fn highest_id(&self, kind: EntityKind) -> StoreFuture<'_, EntityId>;

    /// Every persisted identifier of `kind`, in any order.
    fn all_ids(&self, kind: EntityKind) -> StoreFuture<'_, Vec<EntityId>>;

    /// App identifiers referenced as package contents, in any order.
    fn package_app_ids(&self) -> StoreFuture<'_, Vec<EntityId>>;

    /// Persisted change counters for `ids`. Ids without a counter are omitted.
    fn change_counters<'a>(
        &'a self,
        kind: EntityKind,
        ids: &'a [EntityId],
    ) -> StoreFuture<'a, HashMap<EntityId, ChangeCounter>>;
}

/// Locally cached access tokens.
pub trait TokenCache: Send + Sync {
    fn known_ids(&self, kind: EntityKind) -> Vec<EntityId>;

    fn access_token(&self, kind: EntityKind, id: EntityId) -> Option<u64>;

    /// Persists the cache. Called once at the end of each token flow.
    fn flush(&self) -> StoreFuture<'_, ()>;
}
