//! Builder for [`DiscoveryEngine`].

use std::sync::Arc;

use serde_json::{Map, Value};
use xds_core::{RenderingContext, XdsError, XdsResult};
use xds_sources::SnapshotProvider;
use xds_templates::{TemplateRegistry, TemplateStore};

use crate::auth::AuthGate;
use crate::engine::DiscoveryEngine;
use crate::metrics::EngineMetrics;

/// Builder for configuring a [`DiscoveryEngine`].
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use xds_engine::DiscoveryEngine;
/// use xds_sources::SourceManager;
/// use xds_templates::{ClustersRenderer, TemplateRegistry};
///
/// let registry = TemplateRegistry::builder()
///     .template("default", "clusters", ClustersRenderer::template())
///     .build()
///     .unwrap();
///
/// let engine = DiscoveryEngine::builder()
///     .templates(registry)
///     .sources(Arc::new(SourceManager::new(vec![])))
///     .debug(true)
///     .build()
///     .unwrap();
///
/// assert!(engine.debug());
/// ```
#[derive(Debug, Default)]
pub struct DiscoveryEngineBuilder {
    auth: Option<AuthGate>,
    templates: Option<Arc<TemplateStore>>,
    sources: Option<Arc<dyn SnapshotProvider>>,
    variables: Map<String, Value>,
    debug: bool,
    metrics: Option<EngineMetrics>,
}

impl DiscoveryEngineBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the auth gate. Defaults to a disabled gate.
    #[must_use]
    pub fn auth(mut self, auth: AuthGate) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Serve templates from `registry`.
    #[must_use]
    pub fn templates(mut self, registry: TemplateRegistry) -> Self {
        self.templates = Some(Arc::new(TemplateStore::new(registry)));
        self
    }

    /// Serve templates from a shared store, so they can be reloaded.
    #[must_use]
    pub fn template_store(mut self, store: Arc<TemplateStore>) -> Self {
        self.templates = Some(store);
        self
    }

    /// Set the source data provider.
    #[must_use]
    pub fn sources(mut self, sources: Arc<dyn SnapshotProvider>) -> Self {
        self.sources = Some(sources);
        self
    }

    /// Add one global template variable.
    #[must_use]
    pub fn variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    /// Set all global template variables.
    #[must_use]
    pub fn variables(mut self, variables: Map<String, Value>) -> Self {
        self.variables = variables;
        self
    }

    /// Expose failure detail to callers.
    #[must_use]
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Share a metrics handle.
    #[must_use]
    pub fn metrics(mut self, metrics: EngineMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] if templates or sources are
    /// missing, or a global variable uses a key the engine reserves.
    pub fn build(self) -> XdsResult<DiscoveryEngine> {
        let templates = self
            .templates
            .ok_or_else(|| XdsError::Configuration("no templates configured".into()))?;
        let sources = self
            .sources
            .ok_or_else(|| XdsError::Configuration("no source provider configured".into()))?;

        if let Some(key) = RenderingContext::RESERVED_KEYS
            .iter()
            .find(|key| self.variables.contains_key(**key))
        {
            return Err(XdsError::Configuration(format!(
                "template variable `{key}` is reserved"
            )));
        }

        let metrics = self.metrics.unwrap_or_default();
        let auth = self
            .auth
            .unwrap_or_else(AuthGate::disabled)
            .with_metrics(metrics.clone());

        Ok(DiscoveryEngine {
            auth,
            templates,
            sources,
            variables: Arc::new(self.variables),
            debug: self.debug,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xds_sources::SourceManager;
    use xds_templates::ClustersRenderer;

    fn registry() -> TemplateRegistry {
        TemplateRegistry::builder()
            .template("default", "clusters", ClustersRenderer::template())
            .build()
            .unwrap()
    }

    #[test]
    fn requires_templates_and_sources() {
        let err = DiscoveryEngineBuilder::new()
            .sources(Arc::new(SourceManager::new(vec![])))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("templates"));

        let err = DiscoveryEngineBuilder::new()
            .templates(registry())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("source"));
    }

    #[test]
    fn reserved_variables_rejected() {
        let err = DiscoveryEngineBuilder::new()
            .templates(registry())
            .sources(Arc::new(SourceManager::new(vec![])))
            .variable("instances", "x")
            .build()
            .unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("instances"));
    }

    #[test]
    fn defaults() {
        let engine = DiscoveryEngineBuilder::new()
            .templates(registry())
            .sources(Arc::new(SourceManager::new(vec![])))
            .variable("region", "eu-west-1")
            .build()
            .unwrap();
        assert!(!engine.debug());
        assert!(!engine.auth.is_enabled());
        assert_eq!(engine.variables["region"], "eu-west-1");
    }
}
