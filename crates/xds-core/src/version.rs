//! Version fingerprints for discovery responses.
//!
//! A [`VersionFingerprint`] is the `version_info` string exchanged with
//! proxies. Equality of fingerprints is the only criterion for deciding that
//! nothing changed between two polls.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Version string a client holds for a resource type.
///
/// `"0"` marks first contact; the engine never produces it as a computed
/// fingerprint.
///
/// # Example
///
/// ```rust
/// use xds_core::VersionFingerprint;
///
/// let initial = VersionFingerprint::initial();
/// let held = VersionFingerprint::new("00c0ffee00c0ffee");
///
/// assert!(initial.is_initial());
/// assert!(!held.is_initial());
/// assert_ne!(initial, held);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionFingerprint(String);

impl VersionFingerprint {
    /// Version a client reports before it has received any configuration.
    pub const INITIAL: &'static str = "0";

    /// Create a fingerprint from a string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// The first-contact version.
    #[must_use]
    pub fn initial() -> Self {
        Self(Self::INITIAL.to_string())
    }

    /// Check if this is the first-contact version.
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.0 == Self::INITIAL
    }

    /// Get the fingerprint as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for VersionFingerprint {
    fn default() -> Self {
        Self::initial()
    }
}

impl fmt::Display for VersionFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for VersionFingerprint {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for VersionFingerprint {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for VersionFingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for VersionFingerprint {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_initial() {
        let v = VersionFingerprint::default();
        assert!(v.is_initial());
        assert_eq!(v.as_str(), "0");
    }

    #[test]
    fn deserializes_from_plain_string() {
        let v: VersionFingerprint = serde_json::from_str("\"abc123\"").unwrap();
        assert_eq!(v.as_str(), "abc123");
        assert_eq!(serde_json::to_string(&v).unwrap(), "\"abc123\"");
    }

    #[test]
    fn display_matches_inner() {
        let v = VersionFingerprint::new("1f2e3d");
        assert_eq!(format!("{v}"), "1f2e3d");
    }
}
