//! Source backends.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::trace;
use xds_core::{InstanceRecord, XdsError, XdsResult};

/// A backend that produces instance records.
///
/// Sources are read by the [`SourceManager`](crate::SourceManager) on every
/// refresh cycle. A fetch returns the complete current record set for the
/// source; partial results are never merged.
#[async_trait]
pub trait Source: Send + Sync + fmt::Debug {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Fetch the current records.
    async fn fetch(&self) -> XdsResult<Vec<InstanceRecord>>;
}

/// Records declared directly in configuration.
#[derive(Debug, Clone)]
pub struct InlineSource {
    name: String,
    instances: Vec<InstanceRecord>,
}

impl InlineSource {
    /// Create an inline source.
    pub fn new(name: impl Into<String>, instances: Vec<InstanceRecord>) -> Self {
        Self {
            name: name.into(),
            instances,
        }
    }
}

#[async_trait]
impl Source for InlineSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> XdsResult<Vec<InstanceRecord>> {
        Ok(self.instances.clone())
    }
}

/// Records read from a JSON or YAML file on every refresh.
///
/// The file holds either a list of records or an object with an
/// `instances` list.
#[derive(Debug, Clone)]
pub struct FileSource {
    name: String,
    path: PathBuf,
}

impl FileSource {
    /// Create a file source.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: format!("file:{}", path.display()),
            path,
        }
    }

    /// Path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, content: &str) -> XdsResult<Vec<InstanceRecord>> {
        let is_yaml = matches!(
            self.path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml")
        );
        let document: Value = if is_yaml {
            serde_yaml::from_str(content)
                .map_err(|e| XdsError::source_failure(format!("{}: invalid YAML", self.name), e))?
        } else {
            serde_json::from_str(content)
                .map_err(|e| XdsError::source_failure(format!("{}: invalid JSON", self.name), e))?
        };

        let items = match document {
            Value::Array(items) => items,
            Value::Object(mut object) => match object.remove("instances") {
                Some(Value::Array(items)) => items,
                _ => return Err(self.shape_error("expected an `instances` list")),
            },
            Value::Null => Vec::new(),
            _ => return Err(self.shape_error("expected a list of records")),
        };

        items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                InstanceRecord::from_value(item)
                    .ok_or_else(|| self.shape_error(&format!("record {i} is not an object")))
            })
            .collect()
    }

    fn shape_error(&self, reason: &str) -> XdsError {
        XdsError::SourceError {
            message: format!("{}: {reason}", self.name),
            source: None,
        }
    }
}

#[async_trait]
impl Source for FileSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> XdsResult<Vec<InstanceRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| XdsError::source_failure(format!("{}: read failed", self.name), e))?;
        let records = self.parse(&content)?;
        trace!(source = %self.name, count = records.len(), "read source file");
        Ok(records)
    }
}

/// Declarative source configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    /// Records listed in configuration.
    Inline {
        /// Optional name for logs.
        #[serde(default)]
        name: Option<String>,
        /// The records.
        #[serde(default)]
        instances: Vec<InstanceRecord>,
    },
    /// Records read from a file.
    File {
        /// Path to a JSON or YAML file.
        path: PathBuf,
    },
}

impl SourceConfig {
    /// Instantiate the configured source.
    pub fn build(self, index: usize) -> Box<dyn Source> {
        match self {
            SourceConfig::Inline { name, instances } => Box::new(InlineSource::new(
                name.unwrap_or_else(|| format!("inline-{index}")),
                instances,
            )),
            SourceConfig::File { path } => Box::new(FileSource::new(path)),
        }
    }
}
