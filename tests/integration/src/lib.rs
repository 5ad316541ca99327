//! Shared fixtures for the end-to-end tests.
//!
//! A [`Workspace`] is a temporary directory holding a record file and a
//! template tree, plus the configuration that points a service at them.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tempfile::TempDir;
use xds_discovery::prelude::*;

/// Partition most tests request from.
pub const CLUSTER: &str = "T1";

/// Build version in the `1.15` band.
pub const BUILD_1_15: &str = "abc/1.15/RELEASE";

/// Temporary record file and template directory.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a workspace with an empty record file and an empty
    /// `default` template band.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        fs::create_dir_all(dir.path().join("templates").join("default"))
            .expect("create template dir");
        let workspace = Self { dir };
        workspace.write_records(&[]);
        workspace
    }

    /// Path of the record file.
    pub fn records_path(&self) -> PathBuf {
        self.dir.path().join("instances.json")
    }

    /// Path of the template directory.
    pub fn templates_path(&self) -> PathBuf {
        self.dir.path().join("templates")
    }

    /// Replace the record file.
    pub fn write_records(&self, records: &[Value]) {
        let document = json!({ "instances": records });
        write(&self.records_path(), &document.to_string());
    }

    /// Replace the record file with arbitrary text.
    pub fn write_raw_records(&self, text: &str) {
        write(&self.records_path(), text);
    }

    /// Write `<band>/<resource_type>.yaml` under the template directory.
    pub fn write_template(&self, band: &str, resource_type: &str, text: &str) {
        let band_dir = self.templates_path().join(band);
        fs::create_dir_all(&band_dir).expect("create band dir");
        write(&band_dir.join(format!("{resource_type}.yaml")), text);
    }

    /// Configuration reading this workspace.
    pub fn config(&self) -> EngineConfig {
        let mut config = EngineConfig {
            sources: vec![SourceConfig::File {
                path: self.records_path(),
            }],
            ..Default::default()
        };
        config.templates.directory = Some(self.templates_path());
        config
    }

    /// Build and start a service over this workspace.
    pub async fn service(&self) -> DiscoveryService {
        start(self.config()).await
    }

    /// Root of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Build and start a service from `config`.
pub async fn start(config: EngineConfig) -> DiscoveryService {
    let service = DiscoveryService::from_config(config)
        .await
        .expect("service configuration");
    service.start().await.expect("warm start");
    service
}

/// A record serving `name` to `clusters`.
pub fn record(name: &str, clusters: &[&str]) -> Value {
    json!({
        "name": name,
        "service_clusters": clusters,
        "endpoints": [{"address": format!("{name}.internal"), "port": 443}],
    })
}

/// A request from `node_id` in `cluster`, holding `version`.
pub fn request(node_id: &str, cluster: &str, version: &str) -> DiscoveryRequest {
    DiscoveryRequest::new(Node::new(node_id, cluster, BUILD_1_15)).with_version(version)
}

/// Names of the resources in a 200 reply.
pub fn resource_names(reply: &DiscoveryReply) -> Vec<String> {
    reply
        .response()
        .map(|response| {
            response
                .resources()
                .iter()
                .filter_map(|r| r["name"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Version carried by a 200 reply.
pub fn served_version(reply: &DiscoveryReply) -> String {
    reply
        .response()
        .map(|response| response.version_info().to_string())
        .expect("reply carries a response")
}

fn write(path: &Path, text: &str) {
    fs::write(path, text).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
}
