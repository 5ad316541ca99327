//! Source manager and the snapshot accessor capability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::future::join_all;
use metrics::{counter, gauge};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use xds_core::{InstanceRecord, XdsError};

use crate::snapshot::SourceSnapshot;
use crate::source::{Source, SourceConfig};
use crate::stats::RefreshStats;
use crate::DEFAULT_MATCH_KEY;

/// Result of one refresh attempt.
#[derive(Debug)]
pub enum RefreshOutcome {
    /// A new snapshot was published.
    Refreshed {
        /// Generation of the published snapshot.
        generation: u64,
        /// Number of records in it.
        instances: usize,
    },
    /// Another refresh was in flight; nothing was done.
    Skipped,
    /// A source failed; the previous snapshot is still served.
    Failed(XdsError),
}

impl RefreshOutcome {
    /// Check if a snapshot was published.
    #[must_use]
    pub fn is_refreshed(&self) -> bool {
        matches!(self, RefreshOutcome::Refreshed { .. })
    }

    /// Short label for metrics and logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Refreshed { .. } => "refreshed",
            RefreshOutcome::Skipped => "skipped",
            RefreshOutcome::Failed(_) => "failed",
        }
    }
}

/// Read and refresh access to source data.
///
/// The engine and the refresh scheduler depend on this capability rather
/// than on a concrete manager, so tests can substitute fakes.
#[async_trait]
pub trait SnapshotProvider: Send + Sync + fmt::Debug {
    /// Records visible to `partition` in the current snapshot.
    ///
    /// The returned list belongs to exactly one snapshot; a concurrent
    /// refresh never changes it.
    fn get_snapshot(&self, partition: &str) -> Arc<Vec<InstanceRecord>>;

    /// Whether a refresh has ever published a snapshot.
    fn is_populated(&self) -> bool;

    /// Refresh unless another refresh is in flight.
    async fn refresh(&self) -> RefreshOutcome;

    /// Refresh, waiting for any in-flight refresh to finish first.
    async fn refresh_now(&self) -> RefreshOutcome;
}

/// Fetches every configured source and publishes the combined records.
///
/// Readers load the current [`SourceSnapshot`] without locking. Writers are
/// serialized by an async mutex and publish a fully built replacement with a
/// single atomic swap. A refresh is all-or-nothing: if any source fails, the
/// previous snapshot stays in place for every partition.
#[derive(Debug)]
pub struct SourceManager {
    /// Backends, fetched concurrently on each refresh.
    sources: Vec<Box<dyn Source>>,
    /// Record attribute naming a record's partitions.
    match_key: String,
    /// Currently published snapshot.
    current: ArcSwap<SourceSnapshot>,
    /// Serializes writers.
    writer: Mutex<()>,
    /// Statistics.
    stats: RefreshStats,
}

impl SourceManager {
    /// Create a manager over `sources` with the default match key.
    pub fn new(sources: Vec<Box<dyn Source>>) -> Self {
        Self {
            sources,
            match_key: DEFAULT_MATCH_KEY.to_string(),
            current: ArcSwap::from_pointee(SourceSnapshot::empty()),
            writer: Mutex::new(()),
            stats: RefreshStats::new(),
        }
    }

    /// Create a manager from declarative source configuration.
    pub fn from_configs(configs: Vec<SourceConfig>) -> Self {
        let sources = configs
            .into_iter()
            .enumerate()
            .map(|(i, config)| config.build(i))
            .collect();
        Self::new(sources)
    }

    /// Use a different record attribute for partition matching.
    #[must_use]
    pub fn with_match_key(mut self, key: impl Into<String>) -> Self {
        self.match_key = key.into();
        self
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<SourceSnapshot> {
        self.current.load_full()
    }

    /// Refresh statistics.
    #[inline]
    pub fn stats(&self) -> &RefreshStats {
        &self.stats
    }

    /// Number of configured sources.
    #[inline]
    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    async fn refresh_locked(&self) -> RefreshOutcome {
        let started = Instant::now();
        let results = join_all(
            self.sources
                .iter()
                .map(|source| async move { (source.name(), source.fetch().await) }),
        )
        .await;

        let mut records = Vec::new();
        for (name, result) in results {
            match result {
                Ok(mut batch) => records.append(&mut batch),
                Err(err) => {
                    warn!(
                        source = %name,
                        error = %err,
                        "source refresh failed, keeping previous snapshot"
                    );
                    self.stats.record_failed();
                    counter!("xds_source_refresh_total", "result" => "failed").increment(1);
                    return RefreshOutcome::Failed(err);
                }
            }
        }

        let generation = self.current.load().generation() + 1;
        let snapshot = SourceSnapshot::build(records, &self.match_key, generation);
        let instances = snapshot.len();
        self.current.store(Arc::new(snapshot));

        self.stats.record_refreshed(instances);
        counter!("xds_source_refresh_total", "result" => "refreshed").increment(1);
        gauge!("xds_source_instances").set(instances as f64);
        info!(
            generation,
            instances,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "published source snapshot"
        );

        RefreshOutcome::Refreshed {
            generation,
            instances,
        }
    }
}

#[async_trait]
impl SnapshotProvider for SourceManager {
    fn get_snapshot(&self, partition: &str) -> Arc<Vec<InstanceRecord>> {
        self.current.load().instances(partition)
    }

    fn is_populated(&self) -> bool {
        self.current.load().is_populated()
    }

    async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.writer.try_lock() else {
            debug!("refresh already in flight, skipping");
            self.stats.record_skipped();
            counter!("xds_source_refresh_total", "result" => "skipped").increment(1);
            return RefreshOutcome::Skipped;
        };
        self.refresh_locked().await
    }

    async fn refresh_now(&self) -> RefreshOutcome {
        let _guard = self.writer.lock().await;
        self.refresh_locked().await
    }
}
