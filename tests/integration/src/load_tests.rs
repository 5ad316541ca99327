//! Load tests with 1000+ polling nodes.
//!
//! These tests verify the engine under many concurrent clients:
//! - 1000 nodes spread over partitions, polling concurrently
//! - Replays answered as not modified
//! - A distinct version for every node
//! - Refreshes that move only the affected partition
//!
//! Run with: `cargo test --package integration-tests --test load_tests -- --nocapture`

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use integration_tests::{record, request, served_version, Workspace};
use tokio::sync::Barrier;
use xds_discovery::prelude::*;

const NUM_PARTITIONS: usize = 10;

fn partition(i: usize) -> String {
    format!("T{}", i % NUM_PARTITIONS)
}

/// Ten partitions with three services each.
fn populated_workspace() -> Workspace {
    let records: Vec<_> = (0..NUM_PARTITIONS * 3)
        .map(|i| record(&format!("svc-{i}"), &[partition(i).as_str()]))
        .collect();
    let workspace = Workspace::new();
    workspace.write_records(&records);
    workspace
}

/// Test 1000 nodes polling concurrently, then replaying their versions.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_1000_nodes() {
    let workspace = populated_workspace();
    let service = Arc::new(workspace.service().await);
    let num_nodes = 1000;
    let num_tasks = 10;
    let nodes_per_task = num_nodes / num_tasks;

    let barrier = Arc::new(Barrier::new(num_tasks));
    let updated = Arc::new(AtomicU64::new(0));
    let unchanged = Arc::new(AtomicU64::new(0));
    let versions: Arc<Mutex<HashSet<String>>> = Arc::default();

    let start = Instant::now();

    let mut handles = Vec::new();
    for task_id in 0..num_tasks {
        let service = Arc::clone(&service);
        let barrier = Arc::clone(&barrier);
        let updated = Arc::clone(&updated);
        let unchanged = Arc::clone(&unchanged);
        let versions = Arc::clone(&versions);

        handles.push(tokio::spawn(async move {
            barrier.wait().await;

            for i in task_id * nodes_per_task..(task_id + 1) * nodes_per_task {
                let node = format!("envoy-sidecar-{i}");
                let cluster = partition(i);

                let reply = service.discover("clusters", request(&node, &cluster, "0")).await;
                assert_eq!(reply.status.as_u16(), 200);
                assert_eq!(reply.response().unwrap().resources().len(), 3);
                updated.fetch_add(1, Ordering::Relaxed);

                let version = served_version(&reply);
                versions.lock().unwrap().insert(version.clone());

                let reply = service
                    .discover("clusters", request(&node, &cluster, &version))
                    .await;
                assert_eq!(reply.status.as_u16(), 304);
                unchanged.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }

    for handle in handles {
        handle.await.expect("Task panicked");
    }

    let duration = start.elapsed();
    let ops = updated.load(Ordering::Relaxed) + unchanged.load(Ordering::Relaxed);
    println!(
        "Concurrent polls: {} ops in {:?} ({:.2} µs/op, {:.0} ops/sec)",
        ops,
        duration,
        duration.as_micros() as f64 / ops as f64,
        ops as f64 / duration.as_secs_f64()
    );

    assert_eq!(updated.load(Ordering::Relaxed), num_nodes as u64);
    assert_eq!(unchanged.load(Ordering::Relaxed), num_nodes as u64);
    // the node is part of the fingerprint
    assert_eq!(versions.lock().unwrap().len(), num_nodes);
}

/// Test that a refresh changing one partition moves only that partition's
/// version.
#[tokio::test]
async fn test_refresh_moves_only_changed_partition() {
    let workspace = populated_workspace();
    let service = workspace.service().await;

    let num_nodes = 1000;
    let node = |i: usize| format!("envoy-sidecar-{i}");

    let mut before = HashMap::with_capacity(num_nodes);
    for i in 0..num_nodes {
        let reply = service
            .discover("clusters", request(&node(i), &partition(i), "0"))
            .await;
        before.insert(i, served_version(&reply));
    }

    let mut records: Vec<_> = (0..NUM_PARTITIONS * 3)
        .map(|i| record(&format!("svc-{i}"), &[partition(i).as_str()]))
        .collect();
    records.push(record("svc-extra", &["T3"]));
    workspace.write_records(&records);
    assert!(service.sources().refresh_now().await.is_refreshed());

    let start = Instant::now();
    let mut updated = 0;
    for i in 0..num_nodes {
        let cluster = partition(i);
        let reply = service
            .discover("clusters", request(&node(i), &cluster, &before[&i]))
            .await;
        match reply.status.as_u16() {
            200 => {
                assert_eq!(cluster, "T3");
                updated += 1;
            }
            304 => assert_ne!(cluster, "T3"),
            other => panic!("unexpected status {other}"),
        }
    }
    let duration = start.elapsed();
    println!(
        "Sequential polls after refresh: {} in {:?} ({:.2} µs/op)",
        num_nodes,
        duration,
        duration.as_micros() as f64 / num_nodes as f64
    );

    assert_eq!(updated, num_nodes / NUM_PARTITIONS);
}
