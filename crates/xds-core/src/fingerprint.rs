//! Deterministic fingerprinting of rendering inputs.
//!
//! The version fingerprint is a pure function of the rendering context, the
//! template checksum and the requesting node. Inputs are fed to an FNV-1a
//! hasher in a canonical form: object keys are visited in sorted order and
//! every JSON value is prefixed with a type discriminant, so two logically
//! equal inputs hash identically regardless of attribute insertion order.
//!
//! FNV has no per-process seed, which keeps fingerprints stable across
//! restarts and across replicas.

use std::fmt;
use std::hash::Hasher;

use fnv::FnvHasher;
use serde_json::{Map, Value};

use crate::{Node, RenderingContext, VersionFingerprint};

/// Checksum of a template's source content.
///
/// Computed once when a template is loaded and never recomputed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentChecksum(u64);

impl ContentChecksum {
    /// Checksum arbitrary source bytes.
    #[must_use]
    pub fn of(content: &[u8]) -> Self {
        let mut hasher = FnvHasher::default();
        hasher.write(content);
        Self(hasher.finish())
    }

    /// Wrap a precomputed checksum value.
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Raw checksum value.
    #[inline]
    #[must_use]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hasher that writes JSON values in canonical form.
///
/// Lengths are written as `u64` so the byte stream does not depend on the
/// platform's pointer width.
#[derive(Default)]
pub struct CanonicalHasher {
    inner: FnvHasher,
}

impl fmt::Debug for CanonicalHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CanonicalHasher")
            .field("state", &format_args!("{:016x}", self.inner.finish()))
            .finish()
    }
}

impl CanonicalHasher {
    /// Create a hasher with the FNV offset basis.
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a length-prefixed string.
    pub fn write_str(&mut self, s: &str) {
        self.write_len(s.len());
        self.inner.write(s.as_bytes());
    }

    /// Write a JSON value.
    pub fn write_value(&mut self, value: &Value) {
        match value {
            Value::Null => self.inner.write_u8(0),
            Value::Bool(b) => {
                self.inner.write_u8(1);
                self.inner.write_u8(u8::from(*b));
            }
            Value::Number(n) => {
                self.inner.write_u8(2);
                if let Some(i) = n.as_i64() {
                    self.inner.write_u8(0);
                    self.inner.write_i64(i);
                } else if let Some(u) = n.as_u64() {
                    self.inner.write_u8(1);
                    self.inner.write_u64(u);
                } else if let Some(f) = n.as_f64() {
                    // serde_json numbers are always finite
                    self.inner.write_u8(2);
                    self.inner.write_u64(f.to_bits());
                }
            }
            Value::String(s) => {
                self.inner.write_u8(3);
                self.write_str(s);
            }
            Value::Array(items) => {
                self.inner.write_u8(4);
                self.write_len(items.len());
                for item in items {
                    self.write_value(item);
                }
            }
            Value::Object(map) => self.write_object(map),
        }
    }

    /// Write a JSON object with keys in sorted order.
    pub fn write_object(&mut self, map: &Map<String, Value>) {
        self.inner.write_u8(5);
        self.write_len(map.len());
        let mut keys: Vec<&String> = map.keys().collect();
        keys.sort_unstable();
        for key in keys {
            self.write_str(key);
            if let Some(value) = map.get(key) {
                self.write_value(value);
            }
        }
    }

    /// Finish and return the raw hash.
    #[must_use]
    pub fn finish(&self) -> u64 {
        self.inner.finish()
    }

    fn write_len(&mut self, len: usize) {
        self.inner.write_u64(len as u64);
    }

    fn write_context(&mut self, context: &RenderingContext) {
        self.write_str("instances");
        self.write_len(context.instances().len());
        for record in context.instances() {
            self.write_object(record.attributes());
        }

        self.write_str("resource_names");
        self.write_len(context.resource_names().len());
        for name in context.resource_names() {
            self.write_str(name);
        }

        self.write_str("debug");
        self.inner.write_u8(u8::from(context.debug()));

        self.write_str("variables");
        self.write_object(context.variables());
    }

    fn write_node(&mut self, node: &Node) {
        self.write_str(&node.id);
        self.write_str(&node.cluster);
        self.write_str(&node.build_version);
        self.write_object(&node.metadata);
        self.write_object(&node.extra);
    }
}

/// Compute the version fingerprint for a set of rendering inputs.
///
/// Runs in time linear in the size of the inputs and performs no I/O.
///
/// # Example
///
/// ```rust
/// use xds_core::{fingerprint, ContentChecksum, Node, RenderingContext};
///
/// let node = Node::new("envoy-1", "T1", "abc/1.15/RELEASE");
/// let ctx = RenderingContext::default();
///
/// let a = fingerprint(&ctx, ContentChecksum::of(b"v1"), &node);
/// let b = fingerprint(&ctx, ContentChecksum::of(b"v2"), &node);
/// assert_ne!(a, b);
/// ```
#[must_use]
pub fn fingerprint(
    context: &RenderingContext,
    template_checksum: ContentChecksum,
    node: &Node,
) -> VersionFingerprint {
    let mut hasher = CanonicalHasher::new();
    hasher.write_context(context);
    hasher.inner.write_u64(template_checksum.as_u64());
    hasher.write_node(node);
    VersionFingerprint::new(format!("{:016x}", hasher.finish()))
}
