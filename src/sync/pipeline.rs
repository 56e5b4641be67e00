//! Sync pipeline composition.
//!
//! Two flows share the dispatch primitives:
//! - `TokenFlow` splits app ids by the app token bound, then (unless the mode
//!   skips them) package ids by the package token bound, paces each batch as
//!   an access-token job, and flushes the token cache once at the end.
//! - `MetadataFlow` splits ids by the metadata bound and paces each batch as
//!   a metadata-only product-info job.
//!
//! Metadata responses delivered by the host go through the change detector,
//! and the changed subset is handed to `TokenFlow`. `TokenFlow` holds no
//! handle on `MetadataFlow`, so feedback stops after one level.

use super::detector::{detect, ChangeSet};
use super::guard::{InvocationKind, SingleFlight};
use super::mode::RunMode;
use super::selector::{persisted, select, Selection};
use crate::catalog::ids::{EntityId, EntityKind};
use crate::catalog::jobs::{JobEngine, JobFlow, JobMetadata, WorkDescriptor};
use crate::catalog::payload::{
    AccessTokenRequest, MetadataResponse, ProductInfoRequest, ProductRequest,
};
use crate::catalog::store::{CatalogStore, TokenCache};
use crate::dispatch::gate::LoadMetrics;
use crate::dispatch::pacer::{DispatchSummary, Pacer};
use crate::dispatch::splitter::{split, RequestBatch};
use crate::runtime::config::SyncConfig;
use crate::runtime::error::SyncError;
use crate::runtime::telemetry::Telemetry;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;

/// Handles on the external systems the pipeline reads from and submits to.
#[derive(Clone)]
pub struct Collaborators {
    pub store: Arc<dyn CatalogStore>,
    pub tokens: Arc<dyn TokenCache>,
    pub jobs: Arc<dyn JobEngine>,
    pub load: Arc<dyn LoadMetrics>,
}

/// Outcome of one flow run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    pub flow: JobFlow,
    /// `None` for metadata refreshes and change feedback, which run outside a mode.
    pub mode: Option<RunMode>,
    pub apps: DispatchSummary,
    pub packages: DispatchSummary,
    pub token_cache_flushed: bool,
}

impl SyncReport {
    fn new(flow: JobFlow, mode: Option<RunMode>) -> Self {
        Self {
            flow,
            mode,
            apps: DispatchSummary::default(),
            packages: DispatchSummary::default(),
            token_cache_flushed: false,
        }
    }

    /// App and package summaries combined.
    pub fn totals(&self) -> DispatchSummary {
        let mut totals = self.apps;
        totals.merge(self.packages);
        totals
    }

    pub fn batches(&self) -> usize {
        self.totals().batches
    }

    pub fn ids(&self) -> usize {
        self.totals().ids
    }
}

fn job_metadata(
    flow: JobFlow,
    batch: &RequestBatch,
    batch_index: usize,
    batch_count: usize,
) -> JobMetadata {
    JobMetadata {
        flow,
        kind: batch.kind(),
        batch_index,
        batch_count,
        batch_len: batch.len(),
        first_id: batch.ids().first().copied(),
        last_id: batch.ids().last().copied(),
    }
}

struct TokenFlow {
    config: SyncConfig,
    tokens: Arc<dyn TokenCache>,
    jobs: Arc<dyn JobEngine>,
    pacer: Pacer,
    telemetry: Arc<Telemetry>,
}

impl TokenFlow {
    async fn run(
        &self,
        apps: &[EntityId],
        packages: &[EntityId],
        mode: Option<RunMode>,
    ) -> Result<SyncReport> {
        let include_packages = mode.map_or(true, |mode| mode.requests_package_tokens());
        let mut report = SyncReport::new(JobFlow::TokenRequest, mode);

        tracing::info!(
            apps = apps.len(),
            packages = packages.len(),
            "requesting access tokens"
        );

        report.apps = self
            .dispatch_kind(EntityKind::App, apps, self.config.app_token_batch_size())
            .await?;

        if include_packages {
            report.packages = self
                .dispatch_kind(
                    EntityKind::Package,
                    packages,
                    self.config.package_token_batch_size(),
                )
                .await?;
        } else {
            tracing::info!(
                packages = packages.len(),
                "forced depots hold depot credentials; skipping package tokens"
            );
        }

        self.tokens
            .flush()
            .await
            .map_err(|source| SyncError::TokenFlush { source })?;
        self.telemetry.record_token_flush();
        report.token_cache_flushed = true;

        Ok(report)
    }

    async fn dispatch_kind(
        &self,
        kind: EntityKind,
        ids: &[EntityId],
        chunk_size: usize,
    ) -> Result<DispatchSummary> {
        let batches = split(kind, ids, chunk_size);
        let batch_count = batches.len();

        self.pacer
            .dispatch(batches, |index, batch| {
                let metadata = job_metadata(JobFlow::TokenRequest, &batch, index, batch_count);
                let request = AccessTokenRequest::for_kind(kind, batch.into_ids());
                let handle = self
                    .jobs
                    .submit(WorkDescriptor::AccessTokens(request), metadata);
                tracing::debug!(
                    kind = %kind,
                    batch = index + 1,
                    of = batch_count,
                    ids = metadata.batch_len,
                    job = handle.0,
                    "submitted access token batch"
                );
            })
            .await
    }
}

struct MetadataFlow {
    config: SyncConfig,
    tokens: Arc<dyn TokenCache>,
    jobs: Arc<dyn JobEngine>,
    pacer: Pacer,
}

impl MetadataFlow {
    async fn run(&self, selection: &Selection, mode: Option<RunMode>) -> Result<SyncReport> {
        let mut report = SyncReport::new(JobFlow::MetadataInfo, mode);

        tracing::info!(
            apps = selection.apps.len(),
            packages = selection.packages.len(),
            "requesting metadata-only product info"
        );

        report.apps = self.dispatch_kind(EntityKind::App, &selection.apps).await?;
        report.packages = self
            .dispatch_kind(EntityKind::Package, &selection.packages)
            .await?;

        Ok(report)
    }

    async fn dispatch_kind(&self, kind: EntityKind, ids: &[EntityId]) -> Result<DispatchSummary> {
        let batches = split(kind, ids, self.config.metadata_batch_size());
        let batch_count = batches.len();

        self.pacer
            .dispatch(batches, |index, batch| {
                let metadata = job_metadata(JobFlow::MetadataInfo, &batch, index, batch_count);
                let requests = batch
                    .ids()
                    .iter()
                    .map(|&id| ProductRequest {
                        id,
                        access_token: self.tokens.access_token(kind, id),
                    })
                    .collect();
                let request = ProductInfoRequest::metadata_only(kind, requests);
                let handle = self
                    .jobs
                    .submit(WorkDescriptor::ProductInfo(request), metadata);
                tracing::debug!(
                    kind = %kind,
                    batch = index + 1,
                    of = batch_count,
                    ids = metadata.batch_len,
                    job = handle.0,
                    "submitted metadata batch"
                );
            })
            .await
    }
}

/// Entry point the host invokes. Safe to share behind an `Arc`.
pub struct SyncPipeline {
    config: SyncConfig,
    store: Arc<dyn CatalogStore>,
    tokens: Arc<dyn TokenCache>,
    token_flow: TokenFlow,
    metadata_flow: MetadataFlow,
    flights: SingleFlight,
    feedback_lane: AsyncMutex<()>,
    telemetry: Arc<Telemetry>,
}

impl SyncPipeline {
    pub fn new(config: SyncConfig, collaborators: Collaborators) -> Self {
        Self::with_telemetry(config, collaborators, Arc::new(Telemetry::default()))
    }

    pub fn with_telemetry(
        config: SyncConfig,
        collaborators: Collaborators,
        telemetry: Arc<Telemetry>,
    ) -> Self {
        let Collaborators {
            store,
            tokens,
            jobs,
            load,
        } = collaborators;
        let gate = config.gate();

        let token_flow = TokenFlow {
            config: config.clone(),
            tokens: tokens.clone(),
            jobs: jobs.clone(),
            pacer: Pacer::new(
                JobFlow::TokenRequest,
                gate,
                load.clone(),
                telemetry.clone(),
                config.token_poll_interval(),
            ),
            telemetry: telemetry.clone(),
        };
        let metadata_flow = MetadataFlow {
            config: config.clone(),
            tokens: tokens.clone(),
            jobs,
            pacer: Pacer::new(
                JobFlow::MetadataInfo,
                gate,
                load,
                telemetry.clone(),
                config.metadata_poll_interval(),
            ),
        };

        Self {
            config,
            store,
            tokens,
            token_flow,
            metadata_flow,
            flights: SingleFlight::new(),
            feedback_lane: AsyncMutex::new(()),
            telemetry,
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        self.telemetry.clone()
    }

    pub fn is_running(&self, kind: InvocationKind) -> bool {
        self.flights.is_running(kind)
    }

    /// Runs one invocation in `mode`.
    ///
    /// `NormalUsingMetadata` drives the metadata-only flow; every other mode
    /// drives the bulk token flow. Fails with [`SyncError::AlreadyRunning`] if
    /// an invocation of the same kind is in progress.
    pub async fn run(&self, mode: RunMode) -> Result<SyncReport> {
        let kind = if mode.uses_metadata_flow() {
            InvocationKind::MetadataRefresh
        } else {
            InvocationKind::TokenSync
        };
        let _guard = self.flights.try_acquire(kind)?;

        let selection = select(
            mode,
            self.store.as_ref(),
            self.tokens.as_ref(),
            &self.config,
        )
        .await?;
        tracing::info!(
            mode = %mode,
            apps = selection.apps.len(),
            packages = selection.packages.len(),
            "sync invocation started"
        );

        let report = if mode.uses_metadata_flow() {
            self.metadata_flow.run(&selection, Some(mode)).await?
        } else {
            self.token_flow
                .run(&selection.apps, &selection.packages, Some(mode))
                .await?
        };

        tracing::info!(
            mode = %mode,
            batches = report.batches(),
            ids = report.ids(),
            "sync invocation finished"
        );
        Ok(report)
    }

    /// Requests metadata-only product info for every persisted app and package.
    pub async fn refresh_metadata(&self) -> Result<SyncReport> {
        let _guard = self.flights.try_acquire(InvocationKind::MetadataRefresh)?;

        let selection = Selection {
            apps: persisted(self.store.as_ref(), EntityKind::App).await?,
            packages: persisted(self.store.as_ref(), EntityKind::Package).await?,
        };
        let report = self.metadata_flow.run(&selection, None).await?;

        tracing::info!(
            batches = report.batches(),
            ids = report.ids(),
            "metadata refresh finished"
        );
        Ok(report)
    }

    /// Compares a metadata response against persisted counters.
    ///
    /// Each kind is read in one snapshot query before comparison. Hosts that
    /// persist the fresh counters should do so only after this returns.
    pub async fn detect_changes(&self, response: &MetadataResponse) -> Result<ChangeSet> {
        let mut changes = ChangeSet::default();
        for kind in EntityKind::ALL {
            let changed = detect(kind, response.counters(kind), self.store.as_ref()).await?;
            self.telemetry.record_changes(kind, changed.len());
            *changes.ids_mut(kind) = changed;
        }
        Ok(changes)
    }

    /// Requests fresh tokens for exactly the changed ids. Runs the token flow
    /// only; it never submits metadata jobs. Returns `None` without flushing
    /// when nothing changed.
    ///
    /// Rounds queue behind one another but do not take the
    /// [`InvocationKind::TokenSync`] slot, so a round may overlap a bulk token
    /// run and flush the cache on its own.
    pub async fn request_tokens_for(&self, changes: &ChangeSet) -> Result<Option<SyncReport>> {
        if changes.is_empty() {
            return Ok(None);
        }

        let _lane = self.feedback_lane.lock().await;
        self.telemetry.record_feedback_round();
        tracing::info!(
            apps = changes.apps.len(),
            packages = changes.packages.len(),
            "metadata changed; requesting fresh tokens"
        );

        let apps = changes.descending(EntityKind::App);
        let packages = changes.descending(EntityKind::Package);
        let report = self.token_flow.run(&apps, &packages, None).await?;
        Ok(Some(report))
    }

    /// Detects changes in `response` and runs the single token feedback round.
    pub async fn handle_metadata_response(&self, response: &MetadataResponse) -> Result<ChangeSet> {
        let changes = self.detect_changes(response).await?;
        self.request_tokens_for(&changes).await?;
        Ok(changes)
    }
}
