//! Templates organized by protocol-version band and resource type.

use std::collections::BTreeMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::{debug, info};
use xds_core::{ResourceType, XdsError, XdsResult};

use crate::template::XdsTemplate;

/// Band used when a client's protocol version has no band of its own.
pub const DEFAULT_BAND: &str = "default";

type Band = BTreeMap<ResourceType, XdsTemplate>;

/// Immutable set of templates.
///
/// A registry can only be obtained through [`TemplateRegistryBuilder::build`],
/// which guarantees that:
///
/// - a `default` band exists;
/// - every other band serves every resource type the `default` band serves.
///
/// With those guarantees a resource type missing from a resolved band is
/// missing everywhere, so [`resolve`](Self::resolve) failing is always the
/// client's fault.
#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    bands: BTreeMap<String, Band>,
}

impl TemplateRegistry {
    /// Create a registry builder.
    pub fn builder() -> TemplateRegistryBuilder {
        TemplateRegistryBuilder::default()
    }

    /// Find the template for a protocol version and resource type.
    ///
    /// Falls back to the `default` band when `version` has no band.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::UnknownResourceType`] if no band serves the type.
    pub fn resolve(&self, version: &str, resource_type: &ResourceType) -> XdsResult<&XdsTemplate> {
        let band = match self.bands.get(version) {
            Some(band) => band,
            None => self.default_band(),
        };
        band.get(resource_type)
            .ok_or_else(|| XdsError::UnknownResourceType {
                resource_type: resource_type.to_string(),
            })
    }

    /// Names of all bands.
    pub fn bands(&self) -> impl Iterator<Item = &str> {
        self.bands.keys().map(String::as_str)
    }

    /// Resource types served by the `default` band.
    pub fn resource_types(&self) -> impl Iterator<Item = &ResourceType> {
        self.default_band().keys()
    }

    /// Total number of templates across bands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bands.values().map(BTreeMap::len).sum()
    }

    /// Check if the registry holds no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn default_band(&self) -> &Band {
        // present by construction
        static EMPTY: Band = BTreeMap::new();
        self.bands.get(DEFAULT_BAND).unwrap_or(&EMPTY)
    }
}

/// Builder for a validated [`TemplateRegistry`].
#[derive(Debug, Default)]
pub struct TemplateRegistryBuilder {
    bands: BTreeMap<String, Band>,
}

impl TemplateRegistryBuilder {
    /// Add a template. A later template for the same slot replaces an earlier one.
    pub fn template(
        mut self,
        band: impl Into<String>,
        resource_type: impl Into<ResourceType>,
        template: XdsTemplate,
    ) -> Self {
        self.insert(band, resource_type, template);
        self
    }

    /// Add a template in place.
    pub fn insert(
        &mut self,
        band: impl Into<String>,
        resource_type: impl Into<ResourceType>,
        template: XdsTemplate,
    ) {
        self.bands
            .entry(band.into())
            .or_default()
            .insert(resource_type.into(), template);
    }

    /// Add a template to the `default` band only if that slot is empty.
    pub fn default_template(
        mut self,
        resource_type: impl Into<ResourceType>,
        template: XdsTemplate,
    ) -> Self {
        self.bands
            .entry(DEFAULT_BAND.to_string())
            .or_default()
            .entry(resource_type.into())
            .or_insert(template);
        self
    }

    /// Validate and build the registry.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] if:
    /// - there is no `default` band, or it is empty
    /// - another band lacks a resource type the `default` band serves
    pub fn build(self) -> XdsResult<TemplateRegistry> {
        let default = self
            .bands
            .get(DEFAULT_BAND)
            .filter(|band| !band.is_empty())
            .ok_or_else(|| {
                XdsError::Configuration("templates must define a non-empty `default` band".into())
            })?;

        for (name, band) in &self.bands {
            let missing: Vec<&str> = default
                .keys()
                .filter(|rt| !band.contains_key(*rt))
                .map(ResourceType::as_str)
                .collect();
            if !missing.is_empty() {
                return Err(XdsError::Configuration(format!(
                    "template band `{name}` is missing {}",
                    missing.join(", ")
                )));
            }
            debug!(band = %name, templates = band.len(), "validated template band");
        }

        Ok(TemplateRegistry { bands: self.bands })
    }
}

/// Shared, atomically replaceable template registry.
///
/// Readers take a reference to the current registry for the duration of a
/// request; a reload publishes a new registry without disturbing them.
#[derive(Debug)]
pub struct TemplateStore {
    current: ArcSwap<TemplateRegistry>,
}

impl TemplateStore {
    /// Create a store holding `registry`.
    pub fn new(registry: TemplateRegistry) -> Self {
        Self {
            current: ArcSwap::from_pointee(registry),
        }
    }

    /// The registry currently in effect.
    #[must_use]
    pub fn current(&self) -> Arc<TemplateRegistry> {
        self.current.load_full()
    }

    /// Publish a replacement registry.
    pub fn replace(&self, registry: TemplateRegistry) {
        info!(
            bands = registry.bands.len(),
            templates = registry.len(),
            "reloaded templates"
        );
        self.current.store(Arc::new(registry));
    }
}
