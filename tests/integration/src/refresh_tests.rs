//! Source refresh tests.
//!
//! These tests verify how source data moves into the served snapshot:
//! - Failed refreshes keep the previous snapshot for every partition
//! - Readers never observe a half-published snapshot
//! - Overlapping refreshes are skipped, not queued
//! - The interval timer picks up changes on its own
//!
//! Run with: `cargo test --package integration-tests --test refresh_tests -- --nocapture`

use std::sync::Arc;
use std::time::Duration;

use integration_tests::{record, request, resource_names, served_version, start, Workspace, CLUSTER};
use tokio::sync::Barrier;
use xds_discovery::prelude::*;
use xds_discovery::sources::RefreshOutcome;

#[tokio::test]
async fn warm_start_failure_is_fatal() {
    let workspace = Workspace::new();
    std::fs::remove_file(workspace.records_path()).unwrap();

    let service = DiscoveryService::from_config(workspace.config())
        .await
        .unwrap();
    let err = service.start().await.unwrap_err();
    assert_eq!(err.kind(), "source_error");
    assert!(!service.sources().is_populated());
}

#[tokio::test]
async fn malformed_file_keeps_previous_snapshot() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER]), record("svcB", &["T2"])]);
    let service = workspace.service().await;

    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    let version = served_version(&reply);
    let generation = service.sources().snapshot().generation();

    workspace.write_raw_records("{ not json");
    let outcome = service.sources().refresh_now().await;
    assert!(matches!(outcome, RefreshOutcome::Failed(_)));
    assert_eq!(service.sources().snapshot().generation(), generation);
    assert_eq!(service.sources().stats().failed(), 1);

    // Both partitions still see the old data
    let reply = service
        .discover("clusters", request("envoy-1", CLUSTER, &version))
        .await;
    assert_eq!(reply.status.as_u16(), 304);
    let reply = service.discover("clusters", request("envoy-2", "T2", "0")).await;
    assert_eq!(resource_names(&reply), vec!["svcB"]);

    // Recovery publishes again
    workspace.write_records(&[record("svcA", &[CLUSTER]), record("svcC", &[CLUSTER])]);
    assert!(service.sources().refresh_now().await.is_refreshed());
    let reply = service
        .discover("clusters", request("envoy-1", CLUSTER, &version))
        .await;
    assert_eq!(reply.status.as_u16(), 200);
    assert_eq!(resource_names(&reply), vec!["svcA", "svcC"]);
}

#[tokio::test]
async fn removed_file_keeps_previous_snapshot() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER])]);
    let service = workspace.service().await;

    std::fs::remove_file(workspace.records_path()).unwrap();
    assert!(matches!(
        service.sources().refresh_now().await,
        RefreshOutcome::Failed(_)
    ));

    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 200);
    assert_eq!(resource_names(&reply), vec!["svcA"]);
}

/// Readers running while snapshots are swapped must each see one whole
/// record set.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_see_whole_snapshots_during_refresh() {
    let set_a = vec![record("svcA1", &[CLUSTER]), record("svcA2", &[CLUSTER])];
    let set_b = vec![
        record("svcB1", &[CLUSTER]),
        record("svcB2", &[CLUSTER]),
        record("svcB3", &[CLUSTER]),
    ];
    let names_a = vec!["svcA1", "svcA2"];
    let names_b = vec!["svcB1", "svcB2", "svcB3"];

    let workspace = Workspace::new();
    workspace.write_records(&set_a);
    let service = Arc::new(workspace.service().await);

    let num_readers = 16;
    let reads_per_reader = 50;
    let swaps = 20;
    let barrier = Arc::new(Barrier::new(num_readers + 1));

    let mut handles = Vec::with_capacity(num_readers);
    for reader in 0..num_readers {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let names_a = names_a.clone();
        let names_b = names_b.clone();

        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            for _ in 0..reads_per_reader {
                let node = format!("envoy-{reader}");
                let reply = service.discover("clusters", request(&node, CLUSTER, "0")).await;
                assert_eq!(reply.status.as_u16(), 200);
                let names = resource_names(&reply);
                assert!(
                    names == names_a || names == names_b,
                    "mixed snapshot: {names:?}"
                );
                tokio::task::yield_now().await;
            }
        }));
    }

    barrier.wait().await;
    for swap in 0..swaps {
        let records = if swap % 2 == 0 { &set_b } else { &set_a };
        workspace.write_records(records);
        assert!(service.sources().refresh_now().await.is_refreshed());
        tokio::task::yield_now().await;
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    // warm start plus every swap
    assert_eq!(service.sources().snapshot().generation(), swaps + 1);
    println!(
        "{} reads across {} swaps, all whole snapshots",
        num_readers * reads_per_reader,
        swaps
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_refreshes_are_skipped() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER])]);
    let service = workspace.service().await;
    let sources = Arc::clone(service.sources());

    let before = sources.snapshot().generation();
    let skipped_before = sources.stats().skipped();
    let num_tasks = 8;
    let barrier = Arc::new(Barrier::new(num_tasks));

    let mut handles = Vec::with_capacity(num_tasks);
    for _ in 0..num_tasks {
        let sources = Arc::clone(&sources);
        let barrier = Arc::clone(&barrier);
        handles.push(tokio::spawn(async move {
            barrier.wait().await;
            sources.refresh().await
        }));
    }

    let mut refreshed = 0;
    let mut skipped = 0;
    for handle in handles {
        match handle.await.expect("Task panicked") {
            RefreshOutcome::Refreshed { .. } => refreshed += 1,
            RefreshOutcome::Skipped => skipped += 1,
            RefreshOutcome::Failed(err) => panic!("refresh failed: {err}"),
        }
    }

    assert!(refreshed >= 1);
    assert_eq!(refreshed + skipped, num_tasks);
    assert_eq!(sources.snapshot().generation(), before + refreshed as u64);
    assert_eq!(sources.stats().skipped(), skipped_before + skipped as u64);
}

#[tokio::test]
async fn interval_timer_publishes_changes() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER])]);
    let mut config = workspace.config();
    config.refresh.interval_seconds = 1;
    config.refresh.refresh_on_request = false;
    let service = start(config).await;

    let generation = service.sources().snapshot().generation();
    workspace.write_records(&[record("svcA", &[CLUSTER]), record("svcB", &[CLUSTER])]);

    let mut published = false;
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if service.sources().snapshot().generation() > generation {
            published = true;
            break;
        }
    }
    assert!(published, "timer did not refresh within 5s");

    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(resource_names(&reply), vec!["svcA", "svcB"]);

    // No more ticks after shutdown
    service.shutdown();
    let generation = service.sources().snapshot().generation();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(service.sources().snapshot().generation(), generation);
}
