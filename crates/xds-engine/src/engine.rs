//! The discovery engine.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, error, info, warn};
use xds_core::{
    fingerprint, DiscoveryRequest, DiscoveryResponse, RenderingContext, XdsError, XdsResult,
};
use xds_sources::SnapshotProvider;
use xds_templates::TemplateStore;

use crate::auth::AuthGate;
use crate::builder::DiscoveryEngineBuilder;
use crate::context::{RequestContext, Stage};
use crate::metrics::EngineMetrics;
use crate::outcome::{DiscoveryOutcome, DiscoveryReply, ResponseMetadata};

/// Answers discovery requests.
///
/// For each request the engine authenticates the node, resolves a template
/// for the node's protocol version, builds a rendering context from the
/// current source snapshot and fingerprints it. If the client already holds
/// that fingerprint the request is answered without rendering.
///
/// The engine holds no per-request state and is shared across requests.
#[derive(Debug)]
pub struct DiscoveryEngine {
    pub(crate) auth: AuthGate,
    pub(crate) templates: Arc<TemplateStore>,
    pub(crate) sources: Arc<dyn SnapshotProvider>,
    pub(crate) variables: Arc<Map<String, Value>>,
    pub(crate) debug: bool,
    pub(crate) metrics: EngineMetrics,
}

impl DiscoveryEngine {
    /// Create an engine builder.
    pub fn builder() -> DiscoveryEngineBuilder {
        DiscoveryEngineBuilder::new()
    }

    /// Whether failures expose their detail to callers.
    #[inline]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Metrics handle.
    #[inline]
    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    /// Template store, for reloads.
    #[inline]
    pub fn templates(&self) -> &Arc<TemplateStore> {
        &self.templates
    }

    /// Source data the engine renders from.
    #[inline]
    pub fn sources(&self) -> &Arc<dyn SnapshotProvider> {
        &self.sources
    }

    /// Run the discovery protocol for one request.
    ///
    /// # Errors
    ///
    /// - [`XdsError::Auth`] when the credential is rejected
    /// - [`XdsError::InvalidRequest`] when `build_version` has no version
    /// - [`XdsError::UnknownResourceType`] when no template serves the type
    /// - [`XdsError::Render`] when the template fails
    /// - [`XdsError::Internal`] when no source snapshot has been published
    pub async fn discover(
        &self,
        ctx: &RequestContext,
        request: &DiscoveryRequest,
    ) -> XdsResult<DiscoveryOutcome> {
        let _total = ctx.time(Stage::Total, &self.metrics);

        self.auth.authenticate(request).await?;

        let envoy_version = request.node.envoy_version()?;
        ctx.record("envoy_version", envoy_version);

        if !self.sources.is_populated() {
            return Err(XdsError::Internal {
                message: "source data has not been loaded yet".into(),
                source: None,
            });
        }

        let registry = self.templates.current();
        let template = registry.resolve(envoy_version, ctx.resource_type())?;

        let context = {
            let _timer = ctx.time(Stage::Context, &self.metrics);
            RenderingContext::builder()
                .instances(self.sources.get_snapshot(request.partition()))
                .resource_names(request.resource_names.clone())
                .debug(self.debug)
                .variables(Arc::clone(&self.variables))
                .build()
        };

        let version = {
            let _timer = ctx.time(Stage::Fingerprint, &self.metrics);
            fingerprint(&context, template.checksum(), &request.node)
        };
        ctx.record("version", version.as_str());

        if request.version_info == version {
            debug!(%version, "client is up to date");
            return Ok(DiscoveryOutcome::Unchanged { version });
        }

        let resources = {
            let _timer = ctx.time(Stage::Render, &self.metrics);
            template.render(&context, request).await?
        };

        Ok(match DiscoveryResponse::new(version.clone(), resources) {
            Some(response) => {
                debug!(
                    %version,
                    resources = response.resources().len(),
                    template = template.origin(),
                    "rendered configuration"
                );
                DiscoveryOutcome::Updated(response)
            }
            None => DiscoveryOutcome::Empty { version },
        })
    }

    /// Run the protocol and map the result onto a reply.
    ///
    /// Errors are logged with the request's correlation id. Their detail and
    /// backtrace only reach the caller in debug mode.
    pub async fn handle(&self, ctx: &RequestContext, request: &DiscoveryRequest) -> DiscoveryReply {
        // echo the raw build version when it has no version segment
        let client_version = request
            .node
            .envoy_version()
            .unwrap_or(request.node.build_version.as_str());
        let metadata =
            ResponseMetadata::for_request(ctx, client_version, &request.resource_names);

        match self.discover(ctx, request).await {
            Ok(outcome) => {
                self.metrics
                    .record_outcome(outcome.label(), ctx.resource_type().as_str());
                let metadata = metadata.with_response_version(outcome.version());
                DiscoveryReply::from_outcome(outcome, metadata)
            }
            Err(err) => {
                self.metrics
                    .record_outcome(err.kind(), ctx.resource_type().as_str());
                let traceback = self.log_failure(ctx, &err);
                DiscoveryReply::from_error(&err, metadata, self.debug, traceback)
            }
        }
    }

    fn log_failure(&self, ctx: &RequestContext, err: &XdsError) -> Option<Vec<String>> {
        let status = err.status_code();
        if status.is_client_error() {
            info!(request_id = %ctx.id(), kind = err.kind(), error = %err, "discovery request rejected");
            return None;
        }

        let backtrace = Backtrace::force_capture();
        let captured = backtrace.status() == BacktraceStatus::Captured;
        error!(
            request_id = %ctx.id(),
            kind = err.kind(),
            error = %err,
            backtrace = %backtrace,
            "discovery request failed"
        );
        if !captured {
            warn!(request_id = %ctx.id(), "backtrace unavailable");
            return None;
        }
        self.debug.then(|| backtrace_lines(&backtrace))
    }
}

fn backtrace_lines(backtrace: &Backtrace) -> Vec<String> {
    backtrace.to_string().lines().map(str::to_string).collect()
}
