//! # xds-core
//!
//! Core types, error handling and change detection for the discovery engine.
//!
//! This crate provides the foundational types used across all other crates:
//!
//! - [`XdsError`] - Error taxonomy with HTTP and gRPC status mapping
//! - [`DiscoveryRequest`] / [`DiscoveryResponse`] - The polling protocol exchange
//! - [`RenderingContext`] - Per-request inputs handed to template renderers
//! - [`VersionFingerprint`] - Change-detection version strings
//! - [`fingerprint`] - Deterministic hashing of the rendering inputs
//! - [`ResourceType`] - Resource-type selectors and their Envoy type URLs
//!
//! ## Example
//!
//! ```rust
//! use xds_core::{fingerprint, ContentChecksum, Node, RenderingContext};
//!
//! let node = Node::new("envoy-1", "T1", "abc/1.15/RELEASE");
//! let context = RenderingContext::builder().resource_names(vec!["svcA".into()]).build();
//! let checksum = ContentChecksum::of(b"template source");
//!
//! let v1 = fingerprint(&context, checksum, &node);
//! let v2 = fingerprint(&context, checksum, &node);
//! assert_eq!(v1, v2);
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod context;
mod error;
mod fingerprint;
mod record;
mod request;
mod resource_type;
mod version;

pub use context::{RenderingContext, RenderingContextBuilder};
pub use error::{AuthError, RenderError, XdsError};
pub use fingerprint::{fingerprint, CanonicalHasher, ContentChecksum};
pub use record::InstanceRecord;
pub use request::{DiscoveryRequest, DiscoveryResponse, Node, AUTH_METADATA_KEY};
pub use resource_type::ResourceType;
pub use version::VersionFingerprint;

/// Result type alias using [`XdsError`].
pub type Result<T> = std::result::Result<T, XdsError>;

/// Alias for Result to maintain backward compatibility.
pub type XdsResult<T> = Result<T>;
