//! In-memory collaborators for embedding hosts' tests and local runs.

use super::ids::{ChangeCounter, EntityId, EntityKind};
use super::jobs::{JobEngine, JobHandle, JobMetadata, WorkDescriptor};
use super::store::{CatalogStore, StoreFuture, TokenCache};
use crate::dispatch::gate::{LoadMetrics, LoadSnapshot};
use anyhow::{anyhow, bail, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default)]
struct StoreTables {
    apps: BTreeMap<EntityId, ChangeCounter>,
    packages: BTreeMap<EntityId, ChangeCounter>,
    package_apps: BTreeSet<EntityId>,
}

impl StoreTables {
    fn table(&self, kind: EntityKind) -> &BTreeMap<EntityId, ChangeCounter> {
        match kind {
            EntityKind::App => &self.apps,
            EntityKind::Package => &self.packages,
        }
    }

    fn table_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<EntityId, ChangeCounter> {
        match kind {
            EntityKind::App => &mut self.apps,
            EntityKind::Package => &mut self.packages,
        }
    }
}

/// Catalog store backed by ordered maps. A counter of `0` is stored as an
/// entity with no persisted change counter.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    tables: Mutex<StoreTables>,
    failing: AtomicBool,
    counter_reads: AtomicUsize,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: EntityKind, id: EntityId, counter: ChangeCounter) {
        lock(&self.tables).table_mut(kind).insert(id, counter);
    }

    pub fn insert_all(&self, kind: EntityKind, ids: impl IntoIterator<Item = EntityId>) {
        let mut tables = lock(&self.tables);
        let table = tables.table_mut(kind);
        for id in ids {
            table.entry(id).or_insert(0);
        }
    }

    pub fn link_package_app(&self, app_id: EntityId) {
        lock(&self.tables).package_apps.insert(app_id);
    }

    /// Makes every subsequent query fail until reset.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of `change_counters` queries served so far.
    pub fn counter_reads(&self) -> usize {
        self.counter_reads.load(Ordering::SeqCst)
    }

    fn check(&self, query: &str) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("in-memory store unavailable for {query}");
        }
        Ok(())
    }
}

impl CatalogStore for InMemoryCatalogStore {
    fn highest_id(&self, kind: EntityKind) -> StoreFuture<'_, EntityId> {
        Box::pin(async move {
            self.check("highest_id")?;
            let tables = lock(&self.tables);
            Ok(tables.table(kind).keys().next_back().copied().unwrap_or(0))
        })
    }

    fn all_ids(&self, kind: EntityKind) -> StoreFuture<'_, Vec<EntityId>> {
        Box::pin(async move {
            self.check("all_ids")?;
            let tables = lock(&self.tables);
            Ok(tables.table(kind).keys().copied().collect())
        })
    }

    fn package_app_ids(&self) -> StoreFuture<'_, Vec<EntityId>> {
        Box::pin(async move {
            self.check("package_app_ids")?;
            let tables = lock(&self.tables);
            Ok(tables.package_apps.iter().copied().collect())
        })
    }

    fn change_counters<'a>(
        &'a self,
        kind: EntityKind,
        ids: &'a [EntityId],
    ) -> StoreFuture<'a, HashMap<EntityId, ChangeCounter>> {
        Box::pin(async move {
            self.check("change_counters")?;
            self.counter_reads.fetch_add(1, Ordering::SeqCst);
            let tables = lock(&self.tables);
            let table = tables.table(kind);
            Ok(ids
                .iter()
                .filter_map(|id| match table.get(id) {
                    Some(&counter) if counter > 0 => Some((*id, counter)),
                    _ => None,
                })
                .collect())
        })
    }
}

/// Token cache keeping tokens in memory and counting flushes.
#[derive(Debug, Default)]
pub struct InMemoryTokenCache {
    apps: Mutex<BTreeMap<EntityId, u64>>,
    packages: Mutex<BTreeMap<EntityId, u64>>,
    flushes: AtomicUsize,
    failing_flush: AtomicBool,
}

impl InMemoryTokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kind: EntityKind, id: EntityId, token: u64) {
        lock(self.map(kind)).insert(id, token);
    }

    pub fn flush_count(&self) -> usize {
        self.flushes.load(Ordering::SeqCst)
    }

    pub fn set_failing_flush(&self, failing: bool) {
        self.failing_flush.store(failing, Ordering::SeqCst);
    }

    fn map(&self, kind: EntityKind) -> &Mutex<BTreeMap<EntityId, u64>> {
        match kind {
            EntityKind::App => &self.apps,
            EntityKind::Package => &self.packages,
        }
    }
}

impl TokenCache for InMemoryTokenCache {
    fn known_ids(&self, kind: EntityKind) -> Vec<EntityId> {
        lock(self.map(kind)).keys().copied().collect()
    }

    fn access_token(&self, kind: EntityKind, id: EntityId) -> Option<u64> {
        lock(self.map(kind)).get(&id).copied()
    }

    fn flush(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            if self.failing_flush.load(Ordering::SeqCst) {
                return Err(anyhow!("token cache flush rejected"));
            }
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    pub handle: JobHandle,
    pub work: WorkDescriptor,
    pub metadata: JobMetadata,
}

type SubmitHook = Box<dyn Fn(&SubmittedJob) + Send + Sync>;

/// Job engine that records submissions instead of executing them.
#[derive(Default)]
pub struct RecordingJobEngine {
    next_handle: AtomicU64,
    submitted: Mutex<Vec<SubmittedJob>>,
    on_submit: Option<SubmitHook>,
}

impl RecordingJobEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `hook` after each submission is recorded.
    pub fn with_hook(hook: impl Fn(&SubmittedJob) + Send + Sync + 'static) -> Self {
        Self {
            on_submit: Some(Box::new(hook)),
            ..Self::default()
        }
    }

    pub fn submitted(&self) -> Vec<SubmittedJob> {
        lock(&self.submitted).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.submitted).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl JobEngine for RecordingJobEngine {
    fn submit(&self, work: WorkDescriptor, metadata: JobMetadata) -> JobHandle {
        let handle = JobHandle(self.next_handle.fetch_add(1, Ordering::SeqCst));
        let job = SubmittedJob {
            handle,
            work,
            metadata,
        };
        if let Some(hook) = &self.on_submit {
            hook(&job);
        }
        lock(&self.submitted).push(job);
        handle
    }
}

/// Load provider replaying scripted snapshots. Only `sample` advances the
/// script; the individual accessors read the entry `sample` would return
/// next. Once the script is exhausted it keeps reporting the idle snapshot.
#[derive(Debug, Default, Clone)]
pub struct StaticLoadMetrics {
    inner: Arc<StaticLoadInner>,
}

#[derive(Debug, Default)]
struct StaticLoadInner {
    script: Mutex<VecDeque<Result<LoadSnapshot, String>>>,
    samples: AtomicUsize,
}

impl StaticLoadMetrics {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn push(&self, snapshot: LoadSnapshot) {
        lock(&self.inner.script).push_back(Ok(snapshot));
    }

    pub fn push_busy(&self, count: usize) {
        for _ in 0..count {
            self.push(LoadSnapshot {
                pending_jobs: 1,
                ..LoadSnapshot::default()
            });
        }
    }

    pub fn push_failure(&self, message: impl Into<String>) {
        lock(&self.inner.script).push_back(Err(message.into()));
    }

    pub fn samples(&self) -> usize {
        self.inner.samples.load(Ordering::SeqCst)
    }

    fn current(&self) -> Result<LoadSnapshot> {
        match lock(&self.inner.script).front() {
            Some(Ok(snapshot)) => Ok(*snapshot),
            Some(Err(message)) => Err(anyhow!(message.clone())),
            None => Ok(LoadSnapshot::default()),
        }
    }
}

impl LoadMetrics for StaticLoadMetrics {
    fn pending_jobs(&self) -> Result<usize> {
        self.current().map(|snapshot| snapshot.pending_jobs)
    }

    fn pending_tasks(&self) -> Result<usize> {
        self.current().map(|snapshot| snapshot.pending_tasks)
    }

    fn in_flight_processing(&self) -> Result<usize> {
        self.current().map(|snapshot| snapshot.in_flight_processing)
    }

    fn held_exclusive_locks(&self) -> Result<usize> {
        self.current().map(|snapshot| snapshot.held_exclusive_locks)
    }

    fn sample(&self) -> Result<LoadSnapshot> {
        self.inner.samples.fetch_add(1, Ordering::SeqCst);
        match lock(&self.inner.script).pop_front() {
            Some(Ok(snapshot)) => Ok(snapshot),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(LoadSnapshot::default()),
        }
    }
}
