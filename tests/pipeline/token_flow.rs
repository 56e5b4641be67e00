use std::sync::Arc;

use catalogsync::{EntityKind, InvocationKind, JobFlow, RunMode, SyncError, WorkDescriptor};

use crate::support::helpers::{assert_strictly_descending, init_tracing, job_ids, Harness};

#[tokio::test(start_paused = true)]
async fn packages_normal_requests_only_package_tokens() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, [1, 2, 3]);
    harness.store.insert_all(EntityKind::Package, [10, 11, 12]);

    let report = harness
        .pipeline()
        .run(RunMode::PackagesNormal)
        .await
        .expect("packages normal run");

    assert_eq!(report.mode, Some(RunMode::PackagesNormal));
    assert_eq!(report.apps.batches, 0);
    assert_eq!(report.packages.batches, 1);

    let jobs = harness.jobs_for(JobFlow::TokenRequest, EntityKind::Package);
    assert_eq!(jobs.len(), 1);
    assert_eq!(job_ids(&jobs[0]), vec![12, 11, 10]);
    match &jobs[0].work {
        WorkDescriptor::AccessTokens(request) => assert!(request.app_ids.is_empty()),
        other => panic!("unexpected work: {other:?}"),
    }
    assert!(harness
        .jobs_for(JobFlow::TokenRequest, EntityKind::App)
        .is_empty());
}

#[tokio::test(start_paused = true)]
async fn forced_depots_skip_package_tokens() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, 1..=450);
    harness.store.insert_all(EntityKind::Package, 1..=20);

    let report = harness
        .pipeline()
        .run(RunMode::WithForcedDepots)
        .await
        .expect("forced depots run");

    assert_eq!(report.apps.batches, 3);
    assert_eq!(report.packages.batches, 0);
    let sizes: Vec<usize> = harness
        .jobs_for(JobFlow::TokenRequest, EntityKind::App)
        .iter()
        .map(|job| job.metadata.batch_len)
        .collect();
    assert_eq!(sizes, vec![200, 200, 50]);
    assert!(harness
        .jobs_for(JobFlow::TokenRequest, EntityKind::Package)
        .is_empty());
    assert_eq!(harness.tokens.flush_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn enumerate_covers_headroom_past_highest_ids() {
    init_tracing();
    let harness = Harness::new(0);
    harness.store.insert_all(EntityKind::App, [3, 10]);
    harness.store.insert_all(EntityKind::Package, [5]);

    let report = harness
        .pipeline()
        .run(RunMode::Enumerate)
        .await
        .expect("enumerate run");

    assert_eq!(report.apps.ids, 50_010);
    assert_eq!(report.apps.batches, 251);
    assert_eq!(report.packages.ids, 10_005);
    assert_eq!(report.packages.batches, 11);

    let apps: Vec<u32> = harness
        .jobs_for(JobFlow::TokenRequest, EntityKind::App)
        .iter()
        .flat_map(job_ids)
        .collect();
    assert_eq!(apps.first(), Some(&50_009));
    assert_eq!(apps.last(), Some(&0));
    assert_strictly_descending(&apps);
}

#[tokio::test(start_paused = true)]
async fn tokens_only_uses_cached_token_ids() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, 1..=100);
    harness.tokens.insert(EntityKind::App, 7, 70);
    harness.tokens.insert(EntityKind::App, 42, 420);
    harness.tokens.insert(EntityKind::Package, 3, 30);

    let report = harness
        .pipeline()
        .run(RunMode::TokensOnly)
        .await
        .expect("tokens only run");

    assert_eq!(report.ids(), 3);
    let apps = harness.jobs_for(JobFlow::TokenRequest, EntityKind::App);
    assert_eq!(job_ids(&apps[0]), vec![42, 7]);
    let packages = harness.jobs_for(JobFlow::TokenRequest, EntityKind::Package);
    assert_eq!(job_ids(&packages[0]), vec![3]);
}

#[tokio::test(start_paused = true)]
async fn full_normal_submits_apps_before_packages_in_descending_order() {
    init_tracing();
    let harness = Harness::new(2);
    harness.store.insert_all(EntityKind::App, 1..=350);
    harness.store.link_package_app(9_000);
    harness.store.insert_all(EntityKind::Package, 1..=1_500);

    harness
        .pipeline()
        .run(RunMode::FullNormal)
        .await
        .expect("full normal run");

    let jobs = harness.jobs.submitted();
    let first_package = jobs
        .iter()
        .position(|job| job.metadata.kind == EntityKind::Package)
        .expect("package batches submitted");
    assert!(jobs[..first_package]
        .iter()
        .all(|job| job.metadata.kind == EntityKind::App));
    assert!(jobs[first_package..]
        .iter()
        .all(|job| job.metadata.kind == EntityKind::Package));

    let apps: Vec<u32> = jobs[..first_package].iter().flat_map(job_ids).collect();
    assert_eq!(apps.len(), 351);
    assert_eq!(apps[0], 9_000);
    assert_strictly_descending(&apps);

    let packages: Vec<u32> = jobs[first_package..].iter().flat_map(job_ids).collect();
    assert_eq!(packages.len(), 1_500);
    assert_strictly_descending(&packages);
    assert!(jobs
        .iter()
        .all(|job| job.metadata.batch_len <= 1_000));
}

#[tokio::test(start_paused = true)]
async fn never_submits_while_engine_is_busy() {
    init_tracing();
    let harness = Harness::new(4);
    harness.store.insert_all(EntityKind::App, 1..=1_000);
    harness.store.insert_all(EntityKind::Package, 1..=3_000);

    let report = harness
        .pipeline()
        .run(RunMode::FullNormal)
        .await
        .expect("full normal run");

    let observed = harness.load.pending_at_submit();
    assert_eq!(observed.len(), report.batches());
    assert!(observed.iter().all(|&pending| pending == 0));
    assert!(report.apps.busy_polls > 0);
}

#[tokio::test(start_paused = true)]
async fn poll_failure_aborts_before_next_submission() {
    init_tracing();
    let harness = Harness::new(0);
    harness.store.insert_all(EntityKind::App, 1..=201);
    harness.load.fail_next_sample();

    let err = harness
        .pipeline()
        .run(RunMode::FullNormal)
        .await
        .expect_err("poll failure should abort");

    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::LoadPoll { .. })
    ));
    assert_eq!(harness.jobs.len(), 1);
    assert_eq!(harness.tokens.flush_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn token_cache_flushed_once_per_run() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, 1..=600);
    harness.store.insert_all(EntityKind::Package, 1..=2_500);
    let pipeline = harness.pipeline();

    let report = pipeline.run(RunMode::FullNormal).await.expect("run");

    assert!(report.token_cache_flushed);
    assert_eq!(harness.tokens.flush_count(), 1);
    assert_eq!(pipeline.telemetry().snapshot().token_flushes, 1);
}

#[tokio::test(start_paused = true)]
async fn overlapping_token_sync_is_rejected() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, 1..=10);
    harness.load.hold(true);
    let pipeline = Arc::new(harness.pipeline());

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move { pipeline.run(RunMode::FullNormal).await }
    });
    while !pipeline.is_running(InvocationKind::TokenSync) {
        tokio::task::yield_now().await;
    }

    let err = pipeline
        .run(RunMode::PackagesNormal)
        .await
        .expect_err("second token sync should be rejected");
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::AlreadyRunning {
            kind: InvocationKind::TokenSync
        })
    ));
    assert_eq!(harness.jobs.len(), 1);

    harness.load.hold(false);
    first.await.expect("join").expect("first run");
    assert!(!pipeline.is_running(InvocationKind::TokenSync));
}
