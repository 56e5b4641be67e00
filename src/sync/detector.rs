//! Diffs fresh change counters against the persisted ones.

use crate::catalog::ids::{ChangeCounter, EntityId, EntityKind};
use crate::catalog::store::CatalogStore;
use crate::runtime::error::SyncError;
use anyhow::Result;
use std::collections::BTreeSet;

/// Entities whose counters differ from what the store holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub apps: BTreeSet<EntityId>,
    pub packages: BTreeSet<EntityId>,
}

impl ChangeSet {
    pub fn ids(&self, kind: EntityKind) -> &BTreeSet<EntityId> {
        match kind {
            EntityKind::App => &self.apps,
            EntityKind::Package => &self.packages,
        }
    }

    pub fn ids_mut(&mut self, kind: EntityKind) -> &mut BTreeSet<EntityId> {
        match kind {
            EntityKind::App => &mut self.apps,
            EntityKind::Package => &mut self.packages,
        }
    }

    pub fn len(&self) -> usize {
        self.apps.len() + self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty() && self.packages.is_empty()
    }

    /// Changed ids of `kind`, newest first.
    pub fn descending(&self, kind: EntityKind) -> Vec<EntityId> {
        self.ids(kind).iter().rev().copied().collect()
    }
}

/// Returns the ids in `fresh` whose counter differs from the persisted one
/// (a missing persisted counter reads as `0`).
///
/// Persisted counters are read in a single query before any comparison, so a
/// concurrent writer storing the fresh values cannot be observed half way.
/// Nothing is written back. Empty input never touches the store.
pub async fn detect(
    kind: EntityKind,
    fresh: &[(EntityId, ChangeCounter)],
    store: &dyn CatalogStore,
) -> Result<BTreeSet<EntityId>> {
    if fresh.is_empty() {
        return Ok(BTreeSet::new());
    }

    let ids: Vec<EntityId> = fresh
        .iter()
        .map(|(id, _)| *id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let persisted = store
        .change_counters(kind, &ids)
        .await
        .map_err(SyncError::store_read("change_counters"))?;

    let changed: BTreeSet<EntityId> = fresh
        .iter()
        .filter(|(id, counter)| persisted.get(id).copied().unwrap_or(0) != *counter)
        .map(|(id, _)| *id)
        .collect();

    tracing::debug!(
        kind = %kind,
        checked = ids.len(),
        changed = changed.len(),
        "compared change counters"
    );

    Ok(changed)
}
