use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an app or package. Unique only within its [`EntityKind`].
pub type EntityId = u32;

/// Last revision observed from the catalog for one entity. A missing counter
/// reads as `0`.
pub type ChangeCounter = u64;

/// The two identifier spaces mirrored from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    App,
    Package,
}

impl EntityKind {
    pub const ALL: [EntityKind; 2] = [EntityKind::App, EntityKind::Package];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::App => "app",
            EntityKind::Package => "package",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sorts ids newest-first and drops duplicates.
pub(crate) fn sort_descending(ids: &mut Vec<EntityId>) {
    ids.sort_unstable_by(|a, b| b.cmp(a));
    ids.dedup();
}
