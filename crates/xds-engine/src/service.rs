//! Assembled discovery service.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tracing::{info, warn};
use xds_core::{DiscoveryRequest, ResourceType, XdsResult};
use xds_sources::SourceManager;
use xds_templates::{load_directory, ClustersRenderer, TemplateRegistry, TemplateRegistryBuilder};

use crate::auth::AuthGate;
use crate::config::EngineConfig;
use crate::engine::DiscoveryEngine;
use crate::metrics::EngineMetrics;
use crate::middleware::{AccessLog, DiscoveryCall, Pipeline, RequestMetrics, ScheduledRefresh};
use crate::outcome::DiscoveryReply;
use crate::scheduler::RefreshScheduler;

/// A discovery engine wired up from configuration, with its sources,
/// refresh scheduler and interceptor pipeline.
///
/// # Example
///
/// ```rust,no_run
/// use xds_engine::{DiscoveryCall, DiscoveryService, EngineConfig};
/// use xds_core::{DiscoveryRequest, Node};
///
/// # async fn example() -> xds_core::XdsResult<()> {
/// let service = DiscoveryService::from_config(EngineConfig::load()?).await?;
/// service.start().await?;
///
/// let request = DiscoveryRequest::new(Node::new("envoy-1", "T1", "abc/1.15/RELEASE"));
/// let reply = service.handle(DiscoveryCall::new("clusters", request)).await;
/// println!("{}", reply.status);
///
/// service.shutdown();
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct DiscoveryService {
    engine: Arc<DiscoveryEngine>,
    sources: Arc<SourceManager>,
    scheduler: Arc<RefreshScheduler>,
    pipeline: Pipeline,
    template_dir: Option<PathBuf>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl DiscoveryService {
    /// Build the service. Sources are not read until [`start`](Self::start).
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`](xds_core::XdsError::Configuration)
    /// if the configuration is invalid or templates fail to load.
    pub async fn from_config(config: EngineConfig) -> XdsResult<Self> {
        config.validate()?;
        let metrics = EngineMetrics::new();

        let sources = Arc::new(
            SourceManager::from_configs(config.sources.clone())
                .with_match_key(config.source_match_key.clone()),
        );

        let auth = AuthGate::from_settings(
            config.auth.enabled,
            config.auth.encryption_key.as_deref(),
            &config.auth.passwords,
        )?;

        let template_dir = config.templates.directory.clone();
        let registry = load_templates(template_dir.as_ref()).await?;

        let engine = Arc::new(
            DiscoveryEngine::builder()
                .auth(auth)
                .templates(registry)
                .sources(sources.clone())
                .variables(config.template_context.clone())
                .debug(config.debug)
                .metrics(metrics.clone())
                .build()?,
        );

        let scheduler = Arc::new(RefreshScheduler::new(
            sources.clone(),
            config.refresh.interval(),
        ));

        let mut pipeline = Pipeline::new(engine.clone())
            .with(RequestMetrics::new(metrics))
            .with(AccessLog);
        if config.refresh.refresh_on_request {
            pipeline = pipeline.with(ScheduledRefresh::new(scheduler.clone()));
        }

        info!(
            sources = sources.source_count(),
            auth = engine.auth.is_enabled(),
            debug = config.debug,
            interceptors = pipeline.len(),
            "discovery service configured"
        );

        Ok(Self {
            engine,
            sources,
            scheduler,
            pipeline,
            template_dir,
            timer: Mutex::new(None),
        })
    }

    /// Load the first snapshot and start the refresh timer.
    ///
    /// # Errors
    ///
    /// Returns the refresh error if the initial load fails.
    pub async fn start(&self) -> XdsResult<()> {
        self.scheduler.warm_start().await?;
        let handle = self.scheduler.spawn();
        if let Some(previous) = self.timer().replace(handle) {
            previous.abort();
        }
        Ok(())
    }

    /// Handle one call through the interceptor pipeline.
    pub async fn handle(&self, call: DiscoveryCall) -> DiscoveryReply {
        self.pipeline.handle(call).await
    }

    /// Handle a request for `resource_type`.
    pub async fn discover(
        &self,
        resource_type: impl Into<ResourceType>,
        request: DiscoveryRequest,
    ) -> DiscoveryReply {
        self.handle(DiscoveryCall::new(resource_type, request)).await
    }

    /// Re-read the template directory and publish the result.
    ///
    /// On failure the current templates stay in effect.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`](xds_core::XdsError::Configuration)
    /// if the templates cannot be loaded or validated.
    pub async fn reload_templates(&self) -> XdsResult<()> {
        match load_templates(self.template_dir.as_ref()).await {
            Ok(registry) => {
                self.engine.templates().replace(registry);
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "template reload failed, keeping current templates");
                Err(err)
            }
        }
    }

    /// Stop the refresh timer.
    pub fn shutdown(&self) {
        self.scheduler.shutdown();
        if let Some(handle) = self.timer().take() {
            handle.abort();
        }
    }

    /// The engine.
    pub fn engine(&self) -> &Arc<DiscoveryEngine> {
        &self.engine
    }

    /// The source manager.
    pub fn sources(&self) -> &Arc<SourceManager> {
        &self.sources
    }

    /// The refresh scheduler.
    pub fn scheduler(&self) -> &Arc<RefreshScheduler> {
        &self.scheduler
    }

    fn timer(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for DiscoveryService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn load_templates(dir: Option<&PathBuf>) -> XdsResult<TemplateRegistry> {
    let builder = match dir {
        Some(dir) => load_directory(dir).await?,
        None => TemplateRegistryBuilder::default(),
    };
    builder
        .default_template(ResourceType::CLUSTERS, ClustersRenderer::template())
        .build()
}
