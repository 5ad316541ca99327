//! Backend instance records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A backend instance record supplied by a source.
///
/// Records are opaque to the engine: they are hashed into the version
/// fingerprint and handed to renderers as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceRecord(Map<String, Value>);

impl InstanceRecord {
    /// Wrap a JSON object as a record.
    #[must_use]
    pub fn new(attributes: Map<String, Value>) -> Self {
        Self(attributes)
    }

    /// Convert a JSON value into a record, if it is an object.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    /// The record's `name` attribute, if present and a string.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Look up an attribute.
    #[inline]
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// All attributes.
    #[inline]
    #[must_use]
    pub fn attributes(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Partitions this record is tagged with under `key`.
    ///
    /// Returns `None` when the record carries no such attribute. A string
    /// value is treated as a single partition.
    #[must_use]
    pub fn partitions(&self, key: &str) -> Option<Vec<&str>> {
        match self.0.get(key)? {
            Value::String(s) => Some(vec![s.as_str()]),
            Value::Array(items) => Some(items.iter().filter_map(Value::as_str).collect()),
            _ => Some(Vec::new()),
        }
    }
}

impl From<InstanceRecord> for Value {
    fn from(record: InstanceRecord) -> Self {
        Value::Object(record.0)
    }
}
