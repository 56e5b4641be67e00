//! Composite "busy" predicate over live load counters supplied by the host.

use anyhow::Result;

pub const DEFAULT_MAX_IN_FLIGHT_PROCESSING: usize = 50;
pub const DEFAULT_MAX_HELD_LOCKS: usize = 4;

/// Point-in-time reading of the four load counters. Never cached across polls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadSnapshot {
    pub pending_jobs: usize,
    pub pending_tasks: usize,
    pub in_flight_processing: usize,
    pub held_exclusive_locks: usize,
}

/// Read-only provider of load counters, injected into the pacer.
pub trait LoadMetrics: Send + Sync {
    /// Jobs queued in the job engine.
    fn pending_jobs(&self) -> Result<usize>;

    /// Tasks queued in the task scheduler.
    fn pending_tasks(&self) -> Result<usize>;

    /// Units currently being processed downstream.
    fn in_flight_processing(&self) -> Result<usize>;

    /// Exclusive resources currently held.
    fn held_exclusive_locks(&self) -> Result<usize>;

    fn sample(&self) -> Result<LoadSnapshot> {
        Ok(LoadSnapshot {
            pending_jobs: self.pending_jobs()?,
            pending_tasks: self.pending_tasks()?,
            in_flight_processing: self.in_flight_processing()?,
            held_exclusive_locks: self.held_exclusive_locks()?,
        })
    }
}

/// Advisory gate; it allows a baseline of in-flight work and held locks but
/// reports busy as soon as anything is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackpressureGate {
    max_in_flight_processing: usize,
    max_held_locks: usize,
}

impl Default for BackpressureGate {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_IN_FLIGHT_PROCESSING, DEFAULT_MAX_HELD_LOCKS)
    }
}

impl BackpressureGate {
    pub fn new(max_in_flight_processing: usize, max_held_locks: usize) -> Self {
        Self {
            max_in_flight_processing,
            max_held_locks,
        }
    }

    pub fn is_busy(&self, snapshot: &LoadSnapshot) -> bool {
        snapshot.pending_tasks > 0
            || snapshot.pending_jobs > 0
            || snapshot.in_flight_processing > self.max_in_flight_processing
            || snapshot.held_exclusive_locks > self.max_held_locks
    }
}
