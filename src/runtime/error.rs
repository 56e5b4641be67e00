use crate::sync::guard::InvocationKind;
use anyhow::Error as AnyError;
use std::fmt;

/// Fatal conditions raised by the sync core. Each aborts the current
/// invocation; callers receive it wrapped in [`anyhow::Error`] and may
/// `downcast_ref::<SyncError>()` to branch on the variant.
#[derive(Debug)]
pub enum SyncError {
    StoreRead {
        query: &'static str,
        source: AnyError,
    },
    TokenFlush {
        source: AnyError,
    },
    LoadPoll {
        source: AnyError,
    },
    AlreadyRunning {
        kind: InvocationKind,
    },
}

impl SyncError {
    pub(crate) fn store_read(query: &'static str) -> impl FnOnce(AnyError) -> SyncError {
        move |source| SyncError::StoreRead { query, source }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::StoreRead { query, source } => {
                write!(f, "store query {query} failed: {source}")
            }
            SyncError::TokenFlush { source } => write!(f, "token cache flush failed: {source}"),
            SyncError::LoadPoll { source } => write!(f, "load metrics poll failed: {source}"),
            SyncError::AlreadyRunning { kind } => {
                write!(f, "{kind} invocation is already running")
            }
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::StoreRead { source, .. }
            | SyncError::TokenFlush { source }
            | SyncError::LoadPoll { source } => Some(source.as_ref()),
            SyncError::AlreadyRunning { .. } => None,
        }
    }
}
