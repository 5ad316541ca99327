//! A renderer paired with the checksum of its source.

use std::sync::Arc;

use serde_json::Value;
use xds_core::{ContentChecksum, DiscoveryRequest, RenderError, RenderingContext};

use crate::renderer::Renderer;

/// A loaded template.
///
/// The checksum is taken once, when the template is constructed, and is an
/// input to every version fingerprint computed with this template. Cloning
/// shares the renderer.
#[derive(Debug, Clone)]
pub struct XdsTemplate {
    renderer: Arc<dyn Renderer>,
    checksum: ContentChecksum,
    origin: Arc<str>,
}

impl XdsTemplate {
    /// Create a template, checksumming `source`.
    pub fn new(renderer: impl Renderer + 'static, source: &[u8]) -> Self {
        Self::with_checksum(renderer, ContentChecksum::of(source))
    }

    /// Create a template with a precomputed checksum.
    pub fn with_checksum(renderer: impl Renderer + 'static, checksum: ContentChecksum) -> Self {
        Self {
            renderer: Arc::new(renderer),
            checksum,
            origin: Arc::from("inline"),
        }
    }

    /// Record where the template came from, for logs.
    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<Arc<str>>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Checksum of the template's source.
    #[inline]
    #[must_use]
    pub fn checksum(&self) -> ContentChecksum {
        self.checksum
    }

    /// Where the template came from.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Render and validate resources for one request.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if the renderer fails or its output is not
    /// valid structured configuration.
    pub async fn render(
        &self,
        context: &RenderingContext,
        request: &DiscoveryRequest,
    ) -> Result<Vec<Value>, RenderError> {
        self.renderer
            .render(context, request)
            .await?
            .into_resources()
    }
}
