//! Metrics for the discovery engine.
//!
//! Everything is emitted through the `metrics` facade; installing an
//! exporter is left to the embedding process. A few counters are also kept
//! in-process so they can be inspected without an exporter.
//!
//! | Metric | Kind | Labels |
//! |---|---|---|
//! | `xds_auth_success_total` | counter | |
//! | `xds_auth_failed_total` | counter | `reason` |
//! | `xds_discovery_stage_ms` | histogram | `stage`, `xds_type`, `partition` |
//! | `xds_discovery_outcomes_total` | counter | `outcome`, `xds_type` |
//! | `xds_discovery_requests_total` | counter | `xds_type`, `client_version`, `response_code` |
//! | `xds_discovery_request_ms` | histogram | `xds_type`, `client_version`, `response_code` |
//! | `xds_discovery_in_flight` | gauge | |

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use metrics::{counter, gauge, histogram};

use crate::context::Stage;

/// Metrics handle for the engine. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EngineMetrics {
    inner: Arc<EngineMetricsInner>,
}

#[derive(Debug, Default)]
struct EngineMetricsInner {
    auth_success: AtomicU64,
    auth_failed: AtomicU64,
    renders: AtomicU64,
    in_flight: AtomicU64,
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineMetrics {
    /// Create a new metrics handle.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(EngineMetricsInner::default()),
        }
    }

    /// Record a successful authentication.
    pub fn auth_succeeded(&self) {
        self.inner.auth_success.fetch_add(1, Ordering::Relaxed);
        counter!("xds_auth_success_total").increment(1);
    }

    /// Record a failed authentication.
    pub fn auth_failed(&self, reason: &'static str) {
        self.inner.auth_failed.fetch_add(1, Ordering::Relaxed);
        counter!("xds_auth_failed_total", "reason" => reason).increment(1);
    }

    /// Record the duration of one engine stage.
    pub fn record_stage(&self, stage: Stage, xds_type: &str, partition: &str, elapsed: Duration) {
        if stage == Stage::Render {
            self.inner.renders.fetch_add(1, Ordering::Relaxed);
        }
        histogram!(
            "xds_discovery_stage_ms",
            "stage" => stage.as_str(),
            "xds_type" => xds_type.to_string(),
            "partition" => partition.to_string()
        )
        .record(elapsed.as_secs_f64() * 1000.0);
    }

    /// Record the protocol outcome of a request.
    pub fn record_outcome(&self, outcome: &'static str, xds_type: &str) {
        counter!(
            "xds_discovery_outcomes_total",
            "outcome" => outcome,
            "xds_type" => xds_type.to_string()
        )
        .increment(1);
    }

    /// Record a completed request as seen by the transport.
    pub fn record_request(
        &self,
        xds_type: &str,
        client_version: &str,
        response_code: u16,
        elapsed: Duration,
    ) {
        let code = response_code.to_string();
        counter!(
            "xds_discovery_requests_total",
            "xds_type" => xds_type.to_string(),
            "client_version" => client_version.to_string(),
            "response_code" => code.clone()
        )
        .increment(1);
        histogram!(
            "xds_discovery_request_ms",
            "xds_type" => xds_type.to_string(),
            "client_version" => client_version.to_string(),
            "response_code" => code
        )
        .record(elapsed.as_secs_f64() * 1000.0);
    }

    /// Successful authentications so far.
    pub fn auth_successes(&self) -> u64 {
        self.inner.auth_success.load(Ordering::Relaxed)
    }

    /// Failed authentications so far.
    pub fn auth_failures(&self) -> u64 {
        self.inner.auth_failed.load(Ordering::Relaxed)
    }

    /// Templates rendered so far.
    pub fn renders(&self) -> u64 {
        self.inner.renders.load(Ordering::Relaxed)
    }

    /// Requests currently being handled.
    pub fn in_flight(&self) -> u64 {
        self.inner.in_flight.load(Ordering::Relaxed)
    }
}

/// Tracks one in-flight request; decrements the gauge when dropped.
#[derive(Debug)]
pub struct InFlightTracker {
    metrics: EngineMetrics,
}

impl InFlightTracker {
    /// Start tracking a request.
    pub fn new(metrics: EngineMetrics) -> Self {
        let count = metrics.inner.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
        gauge!("xds_discovery_in_flight").set(count as f64);
        Self { metrics }
    }
}

impl Drop for InFlightTracker {
    fn drop(&mut self) {
        let count = self.metrics.inner.in_flight.fetch_sub(1, Ordering::Relaxed) - 1;
        gauge!("xds_discovery_in_flight").set(count as f64);
    }
}
