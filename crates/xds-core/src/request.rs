//! Discovery request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{VersionFingerprint, XdsError, XdsResult};

/// Metadata key carrying the encrypted credential.
pub const AUTH_METADATA_KEY: &str = "auth";

/// Identity of the requesting proxy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Node identifier.
    #[serde(default)]
    pub id: String,
    /// Partition the node belongs to.
    pub cluster: String,
    /// Build string, formatted `revision/version/...`.
    pub build_version: String,
    /// Opaque metadata, may carry the encrypted credential.
    #[serde(default)]
    pub metadata: Map<String, Value>,
    /// Any other node fields (locality, user agent, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Node {
    /// Create a node with empty metadata.
    pub fn new(
        id: impl Into<String>,
        cluster: impl Into<String>,
        build_version: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            cluster: cluster.into(),
            build_version: build_version.into(),
            ..Default::default()
        }
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Protocol version parsed from `build_version`.
    ///
    /// Only the second `/`-separated segment is consumed.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::InvalidRequest`] if the segment is absent or empty.
    pub fn envoy_version(&self) -> XdsResult<&str> {
        let mut segments = self.build_version.split('/');
        let _revision = segments.next();
        match segments.next() {
            Some(version) if !version.is_empty() => Ok(version),
            _ => Err(XdsError::invalid_request(format!(
                "build_version {:?} does not contain a version segment",
                self.build_version
            ))),
        }
    }
}

/// A discovery request received from a proxy node.
///
/// # Example
///
/// ```rust
/// use xds_core::DiscoveryRequest;
///
/// let request: DiscoveryRequest = serde_json::from_str(
///     r#"{"node": {"cluster": "T1", "build_version": "abc/1.15/RELEASE"}}"#,
/// ).unwrap();
///
/// assert!(request.version_info.is_initial());
/// assert!(request.resource_names.is_empty());
/// assert_eq!(request.node.envoy_version().unwrap(), "1.15");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryRequest {
    /// Requesting node.
    pub node: Node,
    /// Requested resource names; empty means all.
    #[serde(default)]
    pub resource_names: Vec<String>,
    /// Version the client currently holds.
    #[serde(default)]
    pub version_info: VersionFingerprint,
}

impl DiscoveryRequest {
    /// Create a first-contact request for all resources.
    pub fn new(node: Node) -> Self {
        Self {
            node,
            resource_names: Vec::new(),
            version_info: VersionFingerprint::initial(),
        }
    }

    /// Set the requested resource names.
    #[must_use]
    pub fn with_resource_names(mut self, names: Vec<String>) -> Self {
        self.resource_names = names;
        self
    }

    /// Set the version the client holds.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<VersionFingerprint>) -> Self {
        self.version_info = version.into();
        self
    }

    /// Partition the requesting node belongs to.
    #[inline]
    #[must_use]
    pub fn partition(&self) -> &str {
        &self.node.cluster
    }

    /// Raw credential field from node metadata.
    #[inline]
    #[must_use]
    pub fn credential(&self) -> Option<&Value> {
        self.node.metadata.get(AUTH_METADATA_KEY)
    }
}

/// A versioned, non-empty set of rendered resources.
///
/// An empty resource set is a distinct outcome, so this type cannot hold one.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryResponse {
    version_info: VersionFingerprint,
    resources: Vec<Value>,
}

impl DiscoveryResponse {
    /// Build a response, or `None` when there are no resources.
    #[must_use]
    pub fn new(version_info: VersionFingerprint, resources: Vec<Value>) -> Option<Self> {
        if resources.is_empty() {
            None
        } else {
            Some(Self {
                version_info,
                resources,
            })
        }
    }

    /// Version of this response.
    #[must_use]
    pub fn version_info(&self) -> &VersionFingerprint {
        &self.version_info
    }

    /// Rendered resources, in template order.
    #[must_use]
    pub fn resources(&self) -> &[Value] {
        &self.resources
    }

    /// Consume and return the parts.
    #[must_use]
    pub fn into_parts(self) -> (VersionFingerprint, Vec<Value>) {
        (self.version_info, self.resources)
    }
}
