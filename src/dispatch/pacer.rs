//! Submit-then-wait dispatch loop paced by the backpressure gate.

use super::gate::{BackpressureGate, LoadMetrics, LoadSnapshot};
use super::splitter::RequestBatch;
use crate::catalog::jobs::JobFlow;
use crate::runtime::error::SyncError;
use crate::runtime::telemetry::Telemetry;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

/// Consecutive busy polls between info-level progress entries.
const PROGRESS_LOG_EVERY: u64 = 20;

/// Totals for one call to [`Pacer::dispatch`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub batches: usize,
    pub ids: usize,
    pub polls: u64,
    pub busy_polls: u64,
}

impl DispatchSummary {
    pub fn merge(&mut self, other: DispatchSummary) {
        self.batches += other.batches;
        self.ids += other.ids;
        self.polls += other.polls;
        self.busy_polls += other.busy_polls;
    }
}

#[derive(Clone)]
pub struct Pacer {
    flow: JobFlow,
    gate: BackpressureGate,
    metrics: Arc<dyn LoadMetrics>,
    telemetry: Arc<Telemetry>,
    poll_interval: Duration,
}

impl Pacer {
    pub fn new(
        flow: JobFlow,
        gate: BackpressureGate,
        metrics: Arc<dyn LoadMetrics>,
        telemetry: Arc<Telemetry>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            flow,
            gate,
            metrics,
            telemetry,
            poll_interval,
        }
    }

    /// Hands each batch to `submit` exactly once, in order, then sleeps and
    /// re-samples the gate until it clears before moving to the next batch.
    ///
    /// `submit` receives the batch index alongside the batch. A failed load
    /// sample aborts the loop with [`SyncError::LoadPoll`]; a gate that never
    /// clears keeps this future pending.
    pub async fn dispatch<I, F>(&self, batches: I, mut submit: F) -> Result<DispatchSummary>
    where
        I: IntoIterator<Item = RequestBatch>,
        F: FnMut(usize, RequestBatch),
    {
        let mut summary = DispatchSummary::default();

        for (index, batch) in batches.into_iter().enumerate() {
            let batch_len = batch.len();
            submit(index, batch);
            summary.batches += 1;
            summary.ids += batch_len;
            self.telemetry.record_submission(self.flow, batch_len);

            self.wait_until_clear(&mut summary).await?;
        }

        Ok(summary)
    }

    async fn wait_until_clear(&self, summary: &mut DispatchSummary) -> Result<()> {
        let mut busy_streak = 0u64;

        loop {
            sleep(self.poll_interval).await;

            let snapshot = self
                .metrics
                .sample()
                .map_err(|source| SyncError::LoadPoll { source })?;
            let busy = self.gate.is_busy(&snapshot);
            summary.polls += 1;
            self.telemetry.record_poll(busy);

            if !busy {
                return Ok(());
            }

            summary.busy_polls += 1;
            busy_streak += 1;
            self.log_busy(&snapshot, busy_streak);
        }
    }

    fn log_busy(&self, snapshot: &LoadSnapshot, busy_streak: u64) {
        if busy_streak % PROGRESS_LOG_EVERY == 0 {
            tracing::info!(
                flow = %self.flow,
                jobs = snapshot.pending_jobs,
                tasks = snapshot.pending_tasks,
                processing = snapshot.in_flight_processing,
                locks = snapshot.held_exclusive_locks,
                busy_polls = busy_streak,
                "waiting for downstream load to clear"
            );
        } else {
            tracing::debug!(
                flow = %self.flow,
                jobs = snapshot.pending_jobs,
                tasks = snapshot.pending_tasks,
                processing = snapshot.in_flight_processing,
                locks = snapshot.held_exclusive_locks,
                "backpressure gate busy"
            );
        }
    }
}
