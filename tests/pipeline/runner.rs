use std::sync::Arc;

use catalogsync::{EntityKind, InvocationKind, MetadataResponse, RunMode, SyncRunner};

use crate::support::helpers::{init_tracing, Harness};

#[tokio::test(start_paused = true)]
async fn spawned_run_resolves_to_report() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::Package, [1, 2]);
    let runner = SyncRunner::new(Arc::new(harness.pipeline()));

    let report = runner
        .spawn_run(RunMode::PackagesNormal)
        .await
        .expect("join")
        .expect("report");
    assert_eq!(report.packages.ids, 2);
}

#[tokio::test(start_paused = true)]
async fn overlapping_spawn_resolves_to_none() {
    init_tracing();
    let harness = Harness::new(1);
    harness.store.insert_all(EntityKind::App, [1]);
    harness.load.hold(true);
    let runner = SyncRunner::new(Arc::new(harness.pipeline()));

    let first = runner.spawn_metadata_refresh();
    while !runner.pipeline().is_running(InvocationKind::MetadataRefresh) {
        tokio::task::yield_now().await;
    }

    let second = runner.spawn_run(RunMode::NormalUsingMetadata);
    assert!(second.await.expect("join").is_none());

    harness.load.hold(false);
    assert!(first.await.expect("join").is_some());
}

#[tokio::test(start_paused = true)]
async fn background_metadata_response_returns_changes() {
    init_tracing();
    let harness = Harness::new(0);
    harness.store.insert(EntityKind::Package, 4, 2);
    let runner = SyncRunner::new(Arc::new(harness.pipeline()));

    let changes = runner
        .spawn_metadata_response(MetadataResponse {
            apps: Vec::new(),
            packages: vec![(4, 3)],
        })
        .await
        .expect("join")
        .expect("changes");
    assert_eq!(changes.descending(EntityKind::Package), vec![4]);
    assert_eq!(harness.jobs.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn store_failure_resolves_to_none() {
    init_tracing();
    let harness = Harness::new(0);
    harness.store.set_failing(true);
    let runner = SyncRunner::new(Arc::new(harness.pipeline()));

    assert!(runner
        .spawn_run(RunMode::FullNormal)
        .await
        .expect("join")
        .is_none());
    assert!(harness.jobs.is_empty());
}
