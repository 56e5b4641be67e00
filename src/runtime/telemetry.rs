use crate::catalog::ids::EntityKind;
use crate::catalog::jobs::JobFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset: flow progress from this crate,
/// warnings from everything else.
pub const DEFAULT_LOG_FILTER: &str = "warn,catalogsync=info";

static TRACING_INIT: OnceLock<()> = OnceLock::new();

fn log_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs a fmt subscriber unless the host already set one. Honours
/// `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]. Later calls are no-ops.
pub fn init_tracing() {
    TRACING_INIT.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(log_filter())
            .with_target(true)
            .try_init();
    });
}

/// Cumulative counters across every invocation sharing this handle.
#[derive(Default, Debug)]
pub struct Telemetry {
    token_batches: AtomicU64,
    token_ids: AtomicU64,
    metadata_batches: AtomicU64,
    metadata_ids: AtomicU64,
    polls: AtomicU64,
    busy_polls: AtomicU64,
    changed_apps: AtomicU64,
    changed_packages: AtomicU64,
    feedback_rounds: AtomicU64,
    token_flushes: AtomicU64,
}

impl Telemetry {
    pub fn record_submission(&self, flow: JobFlow, batch_len: usize) {
        let (batches, ids) = match flow {
            JobFlow::TokenRequest => (&self.token_batches, &self.token_ids),
            JobFlow::MetadataInfo => (&self.metadata_batches, &self.metadata_ids),
        };
        batches.fetch_add(1, Ordering::Relaxed);
        ids.fetch_add(batch_len as u64, Ordering::Relaxed);
    }

    pub fn record_poll(&self, busy: bool) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        if busy {
            self.busy_polls.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_changes(&self, kind: EntityKind, count: usize) {
        if count == 0 {
            return;
        }
        let counter = match kind {
            EntityKind::App => &self.changed_apps,
            EntityKind::Package => &self.changed_packages,
        };
        counter.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn record_feedback_round(&self) {
        self.feedback_rounds.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_token_flush(&self) {
        self.token_flushes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            token_batches: self.token_batches.load(Ordering::Relaxed),
            token_ids: self.token_ids.load(Ordering::Relaxed),
            metadata_batches: self.metadata_batches.load(Ordering::Relaxed),
            metadata_ids: self.metadata_ids.load(Ordering::Relaxed),
            polls: self.polls.load(Ordering::Relaxed),
            busy_polls: self.busy_polls.load(Ordering::Relaxed),
            changed_apps: self.changed_apps.load(Ordering::Relaxed),
            changed_packages: self.changed_packages.load(Ordering::Relaxed),
            feedback_rounds: self.feedback_rounds.load(Ordering::Relaxed),
            token_flushes: self.token_flushes.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub token_batches: u64,
    pub token_ids: u64,
    pub metadata_batches: u64,
    pub metadata_ids: u64,
    pub polls: u64,
    pub busy_polls: u64,
    pub changed_apps: u64,
    pub changed_packages: u64,
    pub feedback_rounds: u64,
    pub token_flushes: u64,
}
