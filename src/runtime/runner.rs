use crate::catalog::payload::MetadataResponse;
use crate::runtime::error::SyncError;
use crate::sync::detector::ChangeSet;
use crate::sync::mode::RunMode;
use crate::sync::pipeline::{SyncPipeline, SyncReport};
use anyhow::Result;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Fire-and-forget launcher for top-level sync routines.
///
/// Each spawned routine runs to completion on the tokio runtime. Failures and
/// panics are logged here and resolve the handle to `None`; nothing is retried.
#[derive(Clone)]
pub struct SyncRunner {
    pipeline: Arc<SyncPipeline>,
}

impl SyncRunner {
    pub fn new(pipeline: Arc<SyncPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<SyncPipeline> {
        &self.pipeline
    }

    pub fn spawn_run(&self, mode: RunMode) -> JoinHandle<Option<SyncReport>> {
        let pipeline = self.pipeline.clone();
        spawn_logged("sync run", async move { pipeline.run(mode).await })
    }

    pub fn spawn_metadata_refresh(&self) -> JoinHandle<Option<SyncReport>> {
        let pipeline = self.pipeline.clone();
        spawn_logged("metadata refresh", async move {
            pipeline.refresh_metadata().await
        })
    }

    /// Processes a completed metadata job's response in the background.
    pub fn spawn_metadata_response(
        &self,
        response: MetadataResponse,
    ) -> JoinHandle<Option<ChangeSet>> {
        let pipeline = self.pipeline.clone();
        spawn_logged("metadata response", async move {
            pipeline.handle_metadata_response(&response).await
        })
    }
}

fn spawn_logged<T, F>(context: &'static str, routine: F) -> JoinHandle<Option<T>>
where
    T: Send + 'static,
    F: Future<Output = Result<T>> + Send + 'static,
{
    tokio::spawn(async move {
        match std::panic::AssertUnwindSafe(routine).catch_unwind().await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                if let Some(SyncError::AlreadyRunning { kind }) = err.downcast_ref::<SyncError>() {
                    tracing::warn!(context, %kind, "skipping overlapping invocation");
                } else {
                    tracing::error!(context, error = %format!("{err:#}"), "sync routine failed");
                }
                None
            }
            Err(panic_payload) => {
                let panic_msg = panic_message(panic_payload.as_ref());
                tracing::error!(context, panic = %panic_msg, "sync routine panicked");
                None
            }
        }
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|message| (*message).to_owned())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_owned())
}
