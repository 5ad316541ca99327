//! Interceptor pipeline wrapped around the engine.
//!
//! Interceptors run in order before the engine handles a request, and in
//! reverse order once the reply exists. Any interceptor may answer a request
//! itself, in which case later interceptors and the engine are skipped.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn, Instrument};
use xds_core::{DiscoveryRequest, ResourceType};

use crate::context::{RequestContext, RequestId};
use crate::engine::DiscoveryEngine;
use crate::metrics::EngineMetrics;
use crate::outcome::DiscoveryReply;
use crate::scheduler::RefreshScheduler;

/// One incoming discovery call, as the transport decoded it.
#[derive(Debug, Clone)]
pub struct DiscoveryCall {
    /// Requested resource type.
    pub resource_type: ResourceType,
    /// Decoded request.
    pub request: DiscoveryRequest,
    /// Correlation id supplied by the caller, if any.
    pub request_id: Option<RequestId>,
}

impl DiscoveryCall {
    /// A call without a caller-supplied correlation id.
    pub fn new(resource_type: impl Into<ResourceType>, request: DiscoveryRequest) -> Self {
        Self {
            resource_type: resource_type.into(),
            request,
            request_id: None,
        }
    }

    /// Use the caller's correlation id.
    #[must_use]
    pub fn with_request_id(mut self, id: impl Into<Arc<str>>) -> Self {
        self.request_id = Some(RequestId::new(id));
        self
    }
}

/// Hook around discovery calls.
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Inspect a call before the engine sees it. Returning a reply answers
    /// the call immediately.
    async fn before(&self, _ctx: &RequestContext, _call: &DiscoveryCall) -> Option<DiscoveryReply> {
        None
    }

    /// Inspect or amend the reply.
    async fn after(&self, _ctx: &RequestContext, _call: &DiscoveryCall, _reply: &mut DiscoveryReply) {}
}

/// Ordered interceptors in front of a [`DiscoveryEngine`].
pub struct Pipeline {
    engine: Arc<DiscoveryEngine>,
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl Pipeline {
    /// A pipeline with no interceptors.
    pub fn new(engine: Arc<DiscoveryEngine>) -> Self {
        Self {
            engine,
            interceptors: Vec::new(),
        }
    }

    /// Append an interceptor.
    #[must_use]
    pub fn with(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Arc::new(interceptor));
        self
    }

    /// The wrapped engine.
    pub fn engine(&self) -> &Arc<DiscoveryEngine> {
        &self.engine
    }

    /// Handle one call.
    ///
    /// The request context is created here, so every interceptor and the
    /// engine share one correlation id and span.
    pub async fn handle(&self, call: DiscoveryCall) -> DiscoveryReply {
        let ctx = RequestContext::with_id(
            call.request_id.clone().unwrap_or_else(RequestId::generate),
            call.resource_type.clone(),
            call.request.partition(),
        );
        let span = ctx.span().clone();

        async {
            let mut ran = 0;
            let mut reply = None;
            for interceptor in &self.interceptors {
                ran += 1;
                if let Some(early) = interceptor.before(&ctx, &call).await {
                    debug!(interceptor = interceptor.name(), "interceptor answered the call");
                    reply = Some(early);
                    break;
                }
            }

            let mut reply = match reply {
                Some(reply) => reply,
                None => self.engine.handle(&ctx, &call.request).await,
            };

            for interceptor in self.interceptors[..ran].iter().rev() {
                interceptor.after(&ctx, &call, &mut reply).await;
            }
            reply
        }
        .instrument(span)
        .await
    }

    /// Number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Check if there are no interceptors.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.interceptors.iter().map(|i| i.name()).collect();
        f.debug_struct("Pipeline")
            .field("interceptors", &names)
            .finish_non_exhaustive()
    }
}

/// Logs one line per completed call.
#[derive(Debug, Default)]
pub struct AccessLog;

#[async_trait]
impl Interceptor for AccessLog {
    fn name(&self) -> &str {
        "access_log"
    }

    async fn after(&self, ctx: &RequestContext, call: &DiscoveryCall, reply: &mut DiscoveryReply) {
        let elapsed_ms = ctx.elapsed().as_secs_f64() * 1000.0;
        if reply.status.is_server_error() {
            warn!(
                status = reply.status.as_u16(),
                node = %call.request.node.id,
                elapsed_ms,
                "discovery"
            );
        } else {
            info!(
                status = reply.status.as_u16(),
                node = %call.request.node.id,
                elapsed_ms,
                "discovery"
            );
        }
    }
}

/// Records request counts, latency and in-flight requests.
///
/// The in-flight count is held by the request context, so a call dropped
/// before `after` runs still releases it.
#[derive(Debug)]
pub struct RequestMetrics {
    metrics: EngineMetrics,
}

impl RequestMetrics {
    /// Report to `metrics`.
    pub fn new(metrics: EngineMetrics) -> Self {
        Self { metrics }
    }
}

#[async_trait]
impl Interceptor for RequestMetrics {
    fn name(&self) -> &str {
        "request_metrics"
    }

    async fn before(&self, ctx: &RequestContext, _call: &DiscoveryCall) -> Option<DiscoveryReply> {
        ctx.track_in_flight(&self.metrics);
        None
    }

    async fn after(&self, ctx: &RequestContext, call: &DiscoveryCall, reply: &mut DiscoveryReply) {
        ctx.release_in_flight();
        self.metrics.record_request(
            call.resource_type.as_str(),
            &reply.metadata.client_version,
            reply.status.as_u16(),
            ctx.elapsed(),
        );
    }
}

/// Triggers a background source refresh when the interval has elapsed.
///
/// The refresh runs on its own task; the triggering call is answered from
/// the snapshot that is current when it reaches the engine.
#[derive(Debug)]
pub struct ScheduledRefresh {
    scheduler: Arc<RefreshScheduler>,
}

impl ScheduledRefresh {
    /// Trigger refreshes through `scheduler`.
    pub fn new(scheduler: Arc<RefreshScheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Interceptor for ScheduledRefresh {
    fn name(&self) -> &str {
        "scheduled_refresh"
    }

    async fn after(&self, _ctx: &RequestContext, _call: &DiscoveryCall, _reply: &mut DiscoveryReply) {
        if !self.scheduler.is_due() {
            return;
        }
        let scheduler = Arc::clone(&self.scheduler);
        tokio::spawn(
            async move {
                scheduler.run_pending().await;
            }
            .in_current_span(),
        );
    }
}
