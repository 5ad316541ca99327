//! # xds-discovery
//!
//! A polling discovery engine for proxy control planes.
//!
//! Proxies poll with the version they hold. The engine answers with new
//! configuration when the version is stale, "not modified" when it is
//! current, and "not found" when there is nothing to serve. Configuration
//! is rendered from templates over instance records pulled from pluggable
//! sources.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xds_discovery::prelude::*;
//!
//! # async fn run() -> XdsResult<()> {
//! let service = DiscoveryService::from_config(EngineConfig::load()?).await?;
//! service.start().await?;
//!
//! let request = DiscoveryRequest::new(Node::new("envoy-1", "T1", "abc/1.15/RELEASE"));
//! let reply = service.discover(ResourceType::CLUSTERS, request).await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - `xds-core` - Request and response shapes, errors, version fingerprints
//! - `xds-sources` - Instance record sources and the atomically swapped snapshot
//! - `xds-templates` - Renderers and the version-banded template registry
//! - `xds-engine` - Authentication, the protocol engine, refresh scheduling
//!
//! This crate re-exports all public APIs for convenience.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **No locks held across await points** - Snapshots are swapped, never mutated
//! 3. **Render only on change** - A matching fingerprint short-circuits rendering
//! 4. **Observable** - Every request carries a correlation id through its logs

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub use xds_core as core;
pub use xds_engine as engine;
pub use xds_sources as sources;
pub use xds_templates as templates;

/// Prelude module for convenient imports.
///
/// ```rust
/// use xds_discovery::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use xds_core::{
        AuthError, DiscoveryRequest, DiscoveryResponse, InstanceRecord, Node, RenderError,
        RenderingContext, ResourceType, VersionFingerprint, XdsError, XdsResult,
    };

    // Sources
    pub use xds_sources::{
        FileSource, InlineSource, SnapshotProvider, Source, SourceConfig, SourceManager,
    };

    // Templates
    pub use xds_templates::{
        ClustersRenderer, FnRenderer, Renderer, StaticRenderer, TemplateRegistry, XdsTemplate,
    };

    // Engine
    pub use xds_engine::{
        AuthGate, DiscoveryCall, DiscoveryEngine, DiscoveryOutcome, DiscoveryReply,
        DiscoveryService, EngineConfig, Interceptor, Pipeline, RefreshScheduler, RequestContext,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("xds-discovery {VERSION} (MSRV {MSRV})")
    }
}
