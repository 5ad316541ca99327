//! # xds-templates
//!
//! Templates turn a rendering context into configuration resources.
//!
//! - [`Renderer`] - The pluggable renderer interface
//! - [`XdsTemplate`] - A renderer plus the checksum of its source
//! - [`TemplateRegistry`] - Templates by protocol-version band and resource type
//! - [`TemplateStore`] - Atomically swappable registry for reloads
//! - [`load_directory`] - Read `<dir>/<band>/<type>.yaml` files into a registry builder
//! - [`ClustersRenderer`] - Built-in `STRICT_DNS` cluster renderer
//!
//! Every registry has a `default` band. A request whose protocol version has
//! no band of its own is served from `default`.
//!
//! ## Example
//!
//! ```rust
//! use xds_core::ResourceType;
//! use xds_templates::{ClustersRenderer, TemplateRegistry, XdsTemplate};
//!
//! let registry = TemplateRegistry::builder()
//!     .template("default", ResourceType::CLUSTERS, ClustersRenderer::template())
//!     .build()
//!     .unwrap();
//!
//! let template = registry.resolve("1.15", &ResourceType::CLUSTERS.into()).unwrap();
//! assert_eq!(template.checksum(), ClustersRenderer::template().checksum());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod builtin;
mod loader;
mod registry;
mod renderer;
mod template;

pub use builtin::ClustersRenderer;
pub use loader::load_directory;
pub use registry::{TemplateRegistry, TemplateRegistryBuilder, TemplateStore, DEFAULT_BAND};
pub use renderer::{parse_document, FnRenderer, RenderOutput, Renderer, StaticRenderer};
pub use template::XdsTemplate;
