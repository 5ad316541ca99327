//! The renderer interface and its stock implementations.

use std::fmt;

use async_trait::async_trait;
use serde_json::Value;
use xds_core::{DiscoveryRequest, RenderError, RenderingContext};

/// What a renderer produced.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOutput {
    /// Structured resources, used as-is.
    Resources(Vec<Value>),
    /// A YAML or JSON document with a top-level `resources` list.
    Document(String),
}

impl RenderOutput {
    /// Validate the output and extract the resource list.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError`] if a document fails to parse or does not have
    /// the expected shape.
    pub fn into_resources(self) -> Result<Vec<Value>, RenderError> {
        match self {
            RenderOutput::Resources(resources) => Ok(resources),
            RenderOutput::Document(text) => parse_document(&text),
        }
    }
}

/// Turns a rendering context into configuration resources.
///
/// Renderers may suspend (for instance to read files), and the engine treats
/// a render call as cancellable: if the caller goes away, the future is
/// dropped and no partial output escapes.
#[async_trait]
pub trait Renderer: Send + Sync + fmt::Debug {
    /// Render resources for one request.
    async fn render(
        &self,
        context: &RenderingContext,
        request: &DiscoveryRequest,
    ) -> Result<RenderOutput, RenderError>;
}

/// Parse a rendered document into its resource list.
///
/// The document must be a mapping whose `resources` entry is a list (or
/// null, meaning no resources).
///
/// # Errors
///
/// Returns [`RenderError::Parse`] with the failure position when the text is
/// not valid YAML, and [`RenderError::InvalidDocument`] when its shape is
/// wrong.
pub fn parse_document(text: &str) -> Result<Vec<Value>, RenderError> {
    let document: Value = serde_yaml::from_str(text).map_err(|e| {
        let location = e.location();
        RenderError::Parse {
            message: e.to_string(),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
        }
    })?;

    let Value::Object(mut object) = document else {
        return Err(RenderError::invalid("document is not a mapping"));
    };
    match object.remove("resources") {
        Some(Value::Array(resources)) => Ok(resources),
        Some(Value::Null) => Ok(Vec::new()),
        Some(_) => Err(RenderError::invalid("`resources` is not a list")),
        None => Err(RenderError::invalid("document has no `resources` entry")),
    }
}

/// Renderer that always returns the same document.
#[derive(Debug, Clone)]
pub struct StaticRenderer {
    document: String,
}

impl StaticRenderer {
    /// Create a renderer over a fixed document.
    pub fn new(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
        }
    }

    /// The document text.
    pub fn document(&self) -> &str {
        &self.document
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn render(
        &self,
        _context: &RenderingContext,
        _request: &DiscoveryRequest,
    ) -> Result<RenderOutput, RenderError> {
        Ok(RenderOutput::Document(self.document.clone()))
    }
}

type RenderFn =
    dyn Fn(&RenderingContext, &DiscoveryRequest) -> Result<Vec<Value>, RenderError> + Send + Sync;

/// Renderer backed by a closure.
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use xds_templates::FnRenderer;
///
/// let renderer = FnRenderer::new(|ctx, _request| {
///     Ok(ctx.instances().iter().map(|i| json!({"name": i.name()})).collect())
/// });
/// ```
pub struct FnRenderer {
    func: Box<RenderFn>,
}

impl FnRenderer {
    /// Wrap a closure.
    pub fn new<F>(func: F) -> Self
    where
        F: Fn(&RenderingContext, &DiscoveryRequest) -> Result<Vec<Value>, RenderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            func: Box::new(func),
        }
    }
}

impl fmt::Debug for FnRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRenderer").finish_non_exhaustive()
    }
}

#[async_trait]
impl Renderer for FnRenderer {
    async fn render(
        &self,
        context: &RenderingContext,
        request: &DiscoveryRequest,
    ) -> Result<RenderOutput, RenderError> {
        (self.func)(context, request).map(RenderOutput::Resources)
    }
}
