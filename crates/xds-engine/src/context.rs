//! Request correlation and stage timing.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::field::Empty;
use tracing::{info_span, Span};
use uuid::Uuid;
use xds_core::ResourceType;

use crate::metrics::{EngineMetrics, InFlightTracker};

/// Correlation id assigned to a request at entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId(Arc<str>);

impl RequestId {
    /// Generate a new random id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Arc::from(Uuid::new_v4().to_string()))
    }

    /// Wrap an id supplied by the transport.
    pub fn new(id: impl Into<Arc<str>>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Timed stages of a discovery request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// The whole engine call.
    Total,
    /// Reading the snapshot and assembling the rendering context.
    Context,
    /// Computing the version fingerprint.
    Fingerprint,
    /// Running the template.
    Render,
}

impl Stage {
    /// Metric label.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Total => "total",
            Stage::Context => "context",
            Stage::Fingerprint => "fingerprint",
            Stage::Render => "render",
        }
    }
}

/// Request-scoped values threaded through every component call.
///
/// Concurrent requests each own their context, so one request never sees
/// another's correlation id. The context's span carries the id into every
/// log line emitted while the request is being handled.
///
/// Guards attached to the context are released when it drops, including
/// when the request future is cancelled part way through.
#[derive(Debug)]
pub struct RequestContext {
    id: RequestId,
    resource_type: ResourceType,
    partition: String,
    started: Instant,
    span: Span,
    stages: Mutex<Vec<(Stage, Duration)>>,
    in_flight: Mutex<Option<InFlightTracker>>,
}

impl RequestContext {
    /// Create a context with a fresh correlation id.
    pub fn new(resource_type: ResourceType, partition: impl Into<String>) -> Self {
        Self::with_id(RequestId::generate(), resource_type, partition)
    }

    /// Create a context with a given correlation id.
    pub fn with_id(id: RequestId, resource_type: ResourceType, partition: impl Into<String>) -> Self {
        let partition = partition.into();
        let span = info_span!(
            "discovery",
            request_id = %id,
            resource_type = %resource_type,
            partition = %partition,
            envoy_version = Empty,
            version = Empty,
        );
        Self {
            id,
            resource_type,
            partition,
            started: Instant::now(),
            span,
            stages: Mutex::new(Vec::with_capacity(4)),
            in_flight: Mutex::new(None),
        }
    }

    /// Correlation id.
    #[inline]
    pub fn id(&self) -> &RequestId {
        &self.id
    }

    /// Requested resource type.
    #[inline]
    pub fn resource_type(&self) -> &ResourceType {
        &self.resource_type
    }

    /// Partition of the requesting node.
    #[inline]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    /// Span that every log line of this request is emitted under.
    #[inline]
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Time since the context was created.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Record a field on the request span.
    pub fn record(&self, field: &'static str, value: &str) {
        self.span.record(field, value);
    }

    /// Start timing a stage.
    pub fn time(&self, stage: Stage, metrics: &EngineMetrics) -> StageTimer<'_> {
        StageTimer {
            ctx: self,
            stage,
            metrics: metrics.clone(),
            start: Instant::now(),
        }
    }

    /// Stages timed so far, in completion order.
    pub fn stage_timings(&self) -> Vec<(Stage, Duration)> {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Count this request as in flight until it completes or is dropped.
    pub fn track_in_flight(&self, metrics: &EngineMetrics) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(InFlightTracker::new(metrics.clone()));
        }
    }

    /// Stop counting this request as in flight.
    pub fn release_in_flight(&self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn finish_stage(&self, stage: Stage, elapsed: Duration) {
        self.stages
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((stage, elapsed));
    }
}

/// Times one stage; records the duration when dropped.
#[derive(Debug)]
pub struct StageTimer<'a> {
    ctx: &'a RequestContext,
    stage: Stage,
    metrics: EngineMetrics,
    start: Instant,
}

impl Drop for StageTimer<'_> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        self.metrics.record_stage(
            self.stage,
            self.ctx.resource_type.as_str(),
            &self.ctx.partition,
            elapsed,
        );
        self.ctx.finish_stage(self.stage, elapsed);
    }
}
