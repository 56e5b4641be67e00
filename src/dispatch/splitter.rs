use crate::catalog::ids::{EntityId, EntityKind};

/// Ordered slice of same-kind identifiers submitted as one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestBatch {
    kind: EntityKind,
    ids: Vec<EntityId>,
}

impl RequestBatch {
    pub fn new(kind: EntityKind, ids: Vec<EntityId>) -> Self {
        Self { kind, ids }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn into_ids(self) -> Vec<EntityId> {
        self.ids
    }
}

/// Lazily chunks `ids` into batches of `chunk_size`; only the last batch may
/// be shorter. A zero chunk size is treated as one.
pub fn split(
    kind: EntityKind,
    ids: &[EntityId],
    chunk_size: usize,
) -> impl ExactSizeIterator<Item = RequestBatch> + '_ {
    ids.chunks(chunk_size.max(1))
        .map(move |chunk| RequestBatch::new(kind, chunk.to_vec()))
}
