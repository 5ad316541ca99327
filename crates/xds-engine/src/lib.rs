//! # xds-engine
//!
//! The discovery protocol engine.
//!
//! This crate answers discovery requests from proxy nodes:
//!
//! - [`AuthGate`] - Verifies the encrypted credential in node metadata
//! - [`DiscoveryEngine`] - Resolves a template, fingerprints the rendering
//!   context and renders only when the client's version is stale
//! - [`RefreshScheduler`] - Warm start, interval refresh and on-demand
//!   refresh of source data
//! - [`Pipeline`] - Interceptors around the engine (access log, request
//!   metrics, request-triggered refresh)
//! - [`DiscoveryService`] - Everything above wired from [`EngineConfig`]
//!
//! ## Outcomes
//!
//! | Outcome | Status |
//! |---|---|
//! | New configuration | 200 |
//! | Client already up to date | 304 |
//! | Template rendered nothing | 404 |
//! | Credential missing or invalid | 401 |
//! | Credential or request malformed | 400 |
//! | Render or internal failure | 500 |
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use xds_core::{DiscoveryRequest, InstanceRecord, Node};
//! use xds_engine::{DiscoveryEngine, DiscoveryOutcome, RequestContext};
//! use xds_sources::{InlineSource, SnapshotProvider, SourceManager};
//! use xds_templates::{ClustersRenderer, TemplateRegistry};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let record = InstanceRecord::from_value(json!({
//!     "name": "svcA",
//!     "service_clusters": ["T1"],
//!     "endpoints": [{"address": "svca.internal", "port": 443}],
//! }))
//! .unwrap();
//! let sources = SourceManager::new(vec![Box::new(InlineSource::new("static", vec![record]))]);
//! sources.refresh_now().await;
//!
//! let engine = DiscoveryEngine::builder()
//!     .templates(
//!         TemplateRegistry::builder()
//!             .template("default", "clusters", ClustersRenderer::template())
//!             .build()
//!             .unwrap(),
//!     )
//!     .sources(Arc::new(sources))
//!     .build()
//!     .unwrap();
//!
//! let ctx = RequestContext::new("clusters".into(), "T1");
//! let request = DiscoveryRequest::new(Node::new("envoy-1", "T1", "abc/1.15/RELEASE"));
//! let outcome = engine.discover(&ctx, &request).await.unwrap();
//! assert!(matches!(outcome, DiscoveryOutcome::Updated(_)));
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
mod builder;
pub mod config;
mod context;
pub mod crypto;
mod engine;
pub mod metrics;
pub mod middleware;
mod outcome;
mod scheduler;
mod service;
pub mod telemetry;


pub use auth::{AuthGate, SecretSet};
pub use builder::DiscoveryEngineBuilder;
pub use config::{AuthConfig, EngineConfig, LoggingConfig, RefreshConfig, TemplatesConfig};
pub use context::{RequestContext, RequestId, Stage, StageTimer};
pub use crypto::{AesGcmCipher, CipherError, CredentialCipher};
pub use engine::DiscoveryEngine;
pub use metrics::{EngineMetrics, InFlightTracker};
pub use middleware::{
    AccessLog, DiscoveryCall, Interceptor, Pipeline, RequestMetrics, ScheduledRefresh,
};
pub use outcome::{
    DiscoveryOutcome, DiscoveryReply, ErrorBody, ReplyBody, ResponseMetadata,
    CLIENT_VERSION_HEADER, REQUESTED_RESOURCES_HEADER, REQUESTED_TYPE_HEADER, REQUEST_ID_HEADER,
    RESPONSE_VERSION_HEADER,
};
pub use scheduler::RefreshScheduler;
pub use service::DiscoveryService;
pub use telemetry::init_tracing;
