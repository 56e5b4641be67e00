use std::time::Duration;

use catalogsync::{EntityKind, JobFlow, MetadataResponse, RunMode, SyncConfig, WorkDescriptor};
use tokio::time::Instant;

use crate::support::helpers::{init_tracing, job_ids, Harness};

fn small_metadata_batches() -> SyncConfig {
    SyncConfig::builder()
        .metadata_batch_size(5)
        .build()
        .expect("valid config")
}

#[tokio::test(start_paused = true)]
async fn normal_using_metadata_submits_metadata_only_batches() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, 1..=12);
    harness.tokens.insert(EntityKind::App, 12, 1_200);

    let report = harness
        .pipeline_with(small_metadata_batches())
        .run(RunMode::NormalUsingMetadata)
        .await
        .expect("metadata run");

    assert_eq!(report.flow, JobFlow::MetadataInfo);
    assert!(!report.token_cache_flushed);

    let jobs = harness.jobs_for(JobFlow::MetadataInfo, EntityKind::App);
    let sizes: Vec<usize> = jobs.iter().map(|job| job.metadata.batch_len).collect();
    assert_eq!(sizes, vec![5, 5, 2]);
    assert_eq!(job_ids(&jobs[0]), vec![12, 11, 10, 9, 8]);

    for job in &jobs {
        match &job.work {
            WorkDescriptor::ProductInfo(request) => {
                assert!(request.metadata_only);
                assert!(request.package_requests.is_empty());
            }
            other => panic!("unexpected work: {other:?}"),
        }
    }
    match &jobs[0].work {
        WorkDescriptor::ProductInfo(request) => {
            assert_eq!(request.app_requests[0].access_token, Some(1_200));
            assert_eq!(request.app_requests[1].access_token, None);
        }
        other => panic!("unexpected work: {other:?}"),
    }
    assert!(harness
        .jobs
        .submitted()
        .iter()
        .all(|job| job.metadata.flow == JobFlow::MetadataInfo));
    assert_eq!(harness.tokens.flush_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn metadata_batches_wait_at_least_one_poll_interval() {
    init_tracing();
    let harness = Harness::new(0);
    harness.store.insert_all(EntityKind::Package, 1..=15);

    let started = Instant::now();
    let report = harness
        .pipeline_with(small_metadata_batches())
        .run(RunMode::NormalUsingMetadata)
        .await
        .expect("metadata run");

    assert_eq!(report.packages.batches, 3);
    assert!(started.elapsed() >= Duration::from_millis(500) * 3);
}

#[tokio::test(start_paused = true)]
async fn refresh_covers_every_persisted_entity() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, 1..=7);
    harness.store.insert_all(EntityKind::Package, 1..=3);
    let pipeline = harness.pipeline_with(small_metadata_batches());

    let report = pipeline.refresh_metadata().await.expect("refresh");

    assert_eq!(report.mode, None);
    assert_eq!(report.apps.batches, 2);
    assert_eq!(report.packages.batches, 1);
    assert_eq!(report.ids(), 10);
    assert_eq!(pipeline.telemetry().snapshot().metadata_batches, 3);
}

#[tokio::test(start_paused = true)]
async fn metadata_response_feeds_back_tokens_for_changed_ids_only() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert(EntityKind::App, 1, 10);
    harness.store.insert(EntityKind::App, 2, 20);
    harness.store.insert(EntityKind::App, 3, 30);
    harness.store.insert(EntityKind::Package, 5, 50);
    let pipeline = harness.pipeline();

    let response = MetadataResponse {
        apps: vec![(1, 10), (2, 21), (3, 31), (4, 1)],
        packages: vec![(5, 50)],
    };
    let changes = pipeline
        .handle_metadata_response(&response)
        .await
        .expect("feedback round");

    assert_eq!(changes.descending(EntityKind::App), vec![4, 3, 2]);
    assert!(changes.ids(EntityKind::Package).is_empty());

    let jobs = harness.jobs.submitted();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].metadata.flow, JobFlow::TokenRequest);
    assert_eq!(job_ids(&jobs[0]), vec![4, 3, 2]);
    assert_eq!(harness.tokens.flush_count(), 1);

    let telemetry = pipeline.telemetry().snapshot();
    assert_eq!(telemetry.feedback_rounds, 1);
    assert_eq!(telemetry.changed_apps, 3);
    assert_eq!(telemetry.metadata_batches, 0);
}

#[tokio::test(start_paused = true)]
async fn feedback_after_metadata_run_stops_at_token_requests() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert(EntityKind::App, 8, 1);
    let pipeline = harness.pipeline();

    pipeline
        .run(RunMode::NormalUsingMetadata)
        .await
        .expect("metadata run");
    pipeline
        .handle_metadata_response(&MetadataResponse {
            apps: vec![(8, 2)],
            packages: Vec::new(),
        })
        .await
        .expect("feedback round");

    let flows: Vec<JobFlow> = harness
        .jobs
        .submitted()
        .iter()
        .map(|job| job.metadata.flow)
        .collect();
    assert_eq!(flows, vec![JobFlow::MetadataInfo, JobFlow::TokenRequest]);
}
