//! Resource-type selectors.
//!
//! Discovery calls select a configuration category by a short key such as
//! `clusters` or `listeners`. Templates are registered under the same keys.
//! gRPC transports select by Envoy type URL instead, so the well-known keys
//! map to and from their v3 type URLs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Well-known selectors and their Envoy v3 type URLs.
const TYPE_URLS: &[(&str, &str)] = &[
    (
        ResourceType::CLUSTERS,
        "type.googleapis.com/envoy.config.cluster.v3.Cluster",
    ),
    (
        ResourceType::ENDPOINTS,
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment",
    ),
    (
        ResourceType::LISTENERS,
        "type.googleapis.com/envoy.config.listener.v3.Listener",
    ),
    (
        ResourceType::ROUTES,
        "type.googleapis.com/envoy.config.route.v3.RouteConfiguration",
    ),
    (
        ResourceType::SCOPED_ROUTES,
        "type.googleapis.com/envoy.config.route.v3.ScopedRouteConfiguration",
    ),
    (
        ResourceType::SECRETS,
        "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret",
    ),
];

/// Category of configuration being requested.
///
/// The set of valid selectors is open: any key a template band defines can
/// be requested. The constants cover the categories Envoy knows about.
///
/// # Example
///
/// ```rust
/// use xds_core::ResourceType;
///
/// let clusters = ResourceType::new(ResourceType::CLUSTERS);
/// assert_eq!(
///     clusters.type_url(),
///     Some("type.googleapis.com/envoy.config.cluster.v3.Cluster")
/// );
///
/// let custom = ResourceType::new("runtime-flags");
/// assert_eq!(custom.type_url(), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceType(String);

impl ResourceType {
    /// Cluster discovery.
    pub const CLUSTERS: &'static str = "clusters";
    /// Endpoint discovery.
    pub const ENDPOINTS: &'static str = "endpoints";
    /// Listener discovery.
    pub const LISTENERS: &'static str = "listeners";
    /// Route discovery.
    pub const ROUTES: &'static str = "routes";
    /// Scoped route discovery.
    pub const SCOPED_ROUTES: &'static str = "scoped-routes";
    /// Secret discovery.
    pub const SECRETS: &'static str = "secrets";

    /// Create a selector from a string.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Resolve a selector from an Envoy type URL.
    #[must_use]
    pub fn from_type_url(type_url: &str) -> Option<Self> {
        TYPE_URLS
            .iter()
            .find(|(_, url)| *url == type_url)
            .map(|(key, _)| Self::new(*key))
    }

    /// Envoy type URL for well-known selectors.
    #[must_use]
    pub fn type_url(&self) -> Option<&'static str> {
        TYPE_URLS
            .iter()
            .find(|(key, _)| *key == self.0)
            .map(|(_, url)| *url)
    }

    /// Get the selector as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ResourceType {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for ResourceType {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
