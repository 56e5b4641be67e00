use crate::runtime::error::SyncError;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Top-level routines that may not overlap with themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvocationKind {
    TokenSync,
    MetadataRefresh,
}

impl fmt::Display for InvocationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationKind::TokenSync => f.write_str("token sync"),
            InvocationKind::MetadataRefresh => f.write_str("metadata refresh"),
        }
    }
}

/// One slot per invocation kind; a second acquire fails until the first
/// guard is dropped.
#[derive(Debug, Default)]
pub struct SingleFlight {
    token_sync: Arc<AtomicBool>,
    metadata_refresh: Arc<AtomicBool>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_acquire(&self, kind: InvocationKind) -> Result<SingleFlightGuard, SyncError> {
        let slot = self.slot(kind);
        if slot.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyRunning { kind });
        }
        Ok(SingleFlightGuard {
            slot: Arc::clone(slot),
            kind,
        })
    }

    pub fn is_running(&self, kind: InvocationKind) -> bool {
        self.slot(kind).load(Ordering::SeqCst)
    }

    fn slot(&self, kind: InvocationKind) -> &Arc<AtomicBool> {
        match kind {
            InvocationKind::TokenSync => &self.token_sync,
            InvocationKind::MetadataRefresh => &self.metadata_refresh,
        }
    }
}

pub struct SingleFlightGuard {
    slot: Arc<AtomicBool>,
    kind: InvocationKind,
}

impl SingleFlightGuard {
    pub fn kind(&self) -> InvocationKind {
        self.kind
    }
}

impl Drop for SingleFlightGuard {
    fn drop(&mut self) {
        self.slot.store(false, Ordering::SeqCst);
    }
}
