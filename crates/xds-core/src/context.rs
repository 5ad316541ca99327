//! Per-request rendering context.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::InstanceRecord;

/// Inputs handed to a template renderer for one request.
///
/// Built fresh per request from a single source snapshot. The instance list
/// and the global variables are shared with the snapshot and the engine
/// configuration, so building a context never copies records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderingContext {
    instances: Arc<Vec<InstanceRecord>>,
    resource_names: Vec<String>,
    debug: bool,
    variables: Arc<Map<String, Value>>,
}

impl RenderingContext {
    /// Keys the engine populates itself; global variables may not use them.
    pub const RESERVED_KEYS: &'static [&'static str] =
        &["instances", "resource_names", "debug", "discovery_request"];

    /// Create a context builder.
    pub fn builder() -> RenderingContextBuilder {
        RenderingContextBuilder::default()
    }

    /// Instance records visible to the requesting partition.
    #[inline]
    #[must_use]
    pub fn instances(&self) -> &[InstanceRecord] {
        &self.instances
    }

    /// Resource names the client asked for; empty means all.
    #[inline]
    #[must_use]
    pub fn resource_names(&self) -> &[String] {
        &self.resource_names
    }

    /// Whether debug rendering is enabled.
    #[inline]
    #[must_use]
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Global template variables.
    #[inline]
    #[must_use]
    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }
}

/// Builder for [`RenderingContext`].
#[derive(Debug, Default)]
pub struct RenderingContextBuilder {
    inner: RenderingContext,
}

impl RenderingContextBuilder {
    /// Set the instance records.
    pub fn instances(mut self, instances: Arc<Vec<InstanceRecord>>) -> Self {
        self.inner.instances = instances;
        self
    }

    /// Set the requested resource names.
    pub fn resource_names(mut self, names: Vec<String>) -> Self {
        self.inner.resource_names = names;
        self
    }

    /// Enable or disable debug rendering.
    pub fn debug(mut self, debug: bool) -> Self {
        self.inner.debug = debug;
        self
    }

    /// Set the global template variables.
    pub fn variables(mut self, variables: Arc<Map<String, Value>>) -> Self {
        self.inner.variables = variables;
        self
    }

    /// Build the context.
    pub fn build(self) -> RenderingContext {
        self.inner
    }
}
