//! End-to-end discovery tests.
//!
//! A service is built from configuration over a record file and a template
//! directory on disk, then driven the way a polling proxy drives it:
//! - Poll cycle: new configuration, not modified, not found
//! - Version bands loaded from the template tree
//! - Credential checks on node metadata
//! - Template reload, including a reload that fails validation
//!
//! Run with: `cargo test --package integration-tests --test engine_tests`

use std::io::Write;

use integration_tests::{
    record, request, resource_names, served_version, start, Workspace, BUILD_1_15, CLUSTER,
};
use xds_discovery::engine::{
    AesGcmCipher, DiscoveryCall, REQUEST_ID_HEADER, RESPONSE_VERSION_HEADER,
};
use xds_discovery::prelude::*;

const LISTENERS: &str = "resources:\n  - name: listener_0\n    address: 0.0.0.0\n    port: 8080\n";

#[tokio::test]
async fn poll_cycle_over_file_source() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER]), record("svcB", &["T2"])]);
    let service = workspace.service().await;

    // First poll gets configuration
    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 200);
    assert_eq!(resource_names(&reply), vec!["svcA"]);
    let version = served_version(&reply);
    let headers = reply.metadata.headers();
    assert_eq!(headers[RESPONSE_VERSION_HEADER], version.as_str());

    // Same version again is not modified, with no body
    let reply = service
        .discover("clusters", request("envoy-1", CLUSTER, &version))
        .await;
    assert_eq!(reply.status.as_u16(), 304);
    assert!(reply.response().is_none());

    // The partition loses its only record
    workspace.write_records(&[record("svcB", &["T2"])]);
    assert!(service.sources().refresh_now().await.is_refreshed());

    let reply = service
        .discover("clusters", request("envoy-1", CLUSTER, &version))
        .await;
    assert_eq!(reply.status.as_u16(), 404);
    assert!(reply.response().is_none());

    service.shutdown();
}

#[tokio::test]
async fn partitions_are_isolated() {
    let workspace = Workspace::new();
    workspace.write_records(&[
        record("svcA", &["T1"]),
        record("svcB", &["T2"]),
        record("svcShared", &["T1", "T2"]),
    ]);
    let service = workspace.service().await;

    let t1 = service.discover("clusters", request("envoy-1", "T1", "0")).await;
    let t2 = service.discover("clusters", request("envoy-2", "T2", "0")).await;

    assert_eq!(resource_names(&t1), vec!["svcA", "svcShared"]);
    assert_eq!(resource_names(&t2), vec!["svcB", "svcShared"]);
    assert_ne!(served_version(&t1), served_version(&t2));

    // Nothing is served to an unknown partition
    let t3 = service.discover("clusters", request("envoy-3", "T3", "0")).await;
    assert_eq!(t3.status.as_u16(), 404);
}

#[tokio::test]
async fn static_template_from_directory() {
    let workspace = Workspace::new();
    workspace.write_template("default", "listeners", LISTENERS);
    let service = workspace.service().await;

    let reply = service.discover("listeners", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 200);
    let response = reply.response().unwrap();
    assert_eq!(response.resources()[0]["name"], "listener_0");
    assert_eq!(response.resources()[0]["port"], 8080);

    // The built-in clusters template still answers, with nothing to serve
    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 404);
}

#[tokio::test]
async fn version_band_selected_by_build_version() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER])]);
    workspace.write_template(
        "1.15",
        "clusters",
        "resources:\n  - name: legacy_cluster\n    type: LOGICAL_DNS\n",
    );
    let service = workspace.service().await;

    let legacy = service
        .discover(
            "clusters",
            DiscoveryRequest::new(Node::new("envoy-1", CLUSTER, BUILD_1_15)),
        )
        .await;
    assert_eq!(resource_names(&legacy), vec!["legacy_cluster"]);

    // No band for 1.20, so the default band answers
    let current = service
        .discover(
            "clusters",
            DiscoveryRequest::new(Node::new("envoy-2", CLUSTER, "abc/1.20/RELEASE")),
        )
        .await;
    assert_eq!(resource_names(&current), vec!["svcA"]);
    assert_ne!(served_version(&legacy), served_version(&current));
}

#[tokio::test]
async fn unknown_resource_type_is_bad_request() {
    let workspace = Workspace::new();
    let service = workspace.service().await;

    let reply = service.discover("secrets", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 400);
    assert_eq!(reply.error().unwrap().error, "unknown_resource_type");
}

#[tokio::test]
async fn credentials_checked_before_discovery() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER])]);

    let key = AesGcmCipher::generate_key().unwrap();
    let cipher = AesGcmCipher::new(&key).unwrap();
    let mut config = workspace.config();
    config.auth.enabled = true;
    config.auth.encryption_key = Some(key);
    config.auth.passwords = vec!["first-secret".into(), "second-secret".into()];
    let service = start(config).await;

    let with_token = |token: String| {
        DiscoveryRequest::new(
            Node::new("envoy-1", CLUSTER, BUILD_1_15).with_metadata("auth", token),
        )
    };

    // Any configured password is accepted
    let token = cipher.encrypt("second-secret").unwrap();
    let reply = service.discover("clusters", with_token(token)).await;
    assert_eq!(reply.status.as_u16(), 200);

    // No credential
    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 401);
    assert_eq!(reply.error().unwrap().error, "missing_credential");

    // Decrypts, but to the wrong password
    let token = cipher.encrypt("not-a-password").unwrap();
    let reply = service.discover("clusters", with_token(token)).await;
    assert_eq!(reply.status.as_u16(), 401);

    // Encrypted under another key
    let other = AesGcmCipher::new(&AesGcmCipher::generate_key().unwrap()).unwrap();
    let token = other.encrypt("first-secret").unwrap();
    let reply = service.discover("clusters", with_token(token)).await;
    assert_eq!(reply.status.as_u16(), 401);

    // Not a token at all
    let reply = service
        .discover("clusters", with_token("not-a-token".into()))
        .await;
    assert_eq!(reply.status.as_u16(), 401);
    assert_eq!(reply.error().unwrap().error, "invalid_credential");
}

#[tokio::test]
async fn request_id_echoed_in_reply() {
    let workspace = Workspace::new();
    let service = workspace.service().await;

    let call = DiscoveryCall::new("clusters", request("envoy-1", CLUSTER, "0"))
        .with_request_id("edge-7f3a");
    let reply = service.handle(call).await;

    assert_eq!(reply.metadata.request_id, "edge-7f3a");
    assert_eq!(reply.metadata.headers()[REQUEST_ID_HEADER], "edge-7f3a");

    // Without one, a fresh id is generated per call
    let a = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    let b = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_ne!(a.metadata.request_id, b.metadata.request_id);
}

#[tokio::test]
async fn template_reload_changes_version() {
    let workspace = Workspace::new();
    workspace.write_template("default", "listeners", LISTENERS);
    let service = workspace.service().await;

    let reply = service.discover("listeners", request("envoy-1", CLUSTER, "0")).await;
    let before = served_version(&reply);

    workspace.write_template(
        "default",
        "listeners",
        "resources:\n  - name: listener_1\n    address: 0.0.0.0\n    port: 9090\n",
    );
    service.reload_templates().await.unwrap();

    let reply = service
        .discover("listeners", request("envoy-1", CLUSTER, &before))
        .await;
    assert_eq!(reply.status.as_u16(), 200);
    assert_eq!(resource_names(&reply), vec!["listener_1"]);
    let after = served_version(&reply);
    assert_ne!(before, after);

    // A band missing a type fails validation; the current templates stay
    workspace.write_template("1.15", "clusters", "resources: []\n");
    assert!(service.reload_templates().await.is_err());

    let reply = service
        .discover("listeners", request("envoy-1", CLUSTER, &after))
        .await;
    assert_eq!(reply.status.as_u16(), 304);
}

#[tokio::test]
async fn broken_template_reports_render_error() {
    let workspace = Workspace::new();
    workspace.write_template("default", "listeners", "resources: [listener_0\n");

    let mut config = workspace.config();
    let service = start(config.clone()).await;
    let reply = service.discover("listeners", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 500);
    let error = reply.error().unwrap();
    assert_eq!(error.error, "render_error");
    assert!(error.traceback.is_none());

    // Debug mode exposes the detail and a traceback
    config.debug = true;
    let service = start(config).await;
    let reply = service.discover("listeners", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 500);
    let error = reply.error().unwrap();
    assert!(error.detail.contains("parse error"));
    assert!(error.traceback.is_some());
}

#[tokio::test]
async fn config_file_drives_service() {
    let workspace = Workspace::new();
    workspace.write_records(&[record("svcA", &[CLUSTER])]);

    let config_path = workspace.path().join("discovery.toml");
    let mut file = std::fs::File::create(&config_path).unwrap();
    write!(
        file,
        r#"
debug = false

[refresh]
interval_seconds = 60

[templates]
directory = "{templates}"

[[sources]]
type = "file"
path = "{records}"
"#,
        templates = workspace.templates_path().display(),
        records = workspace.records_path().display(),
    )
    .unwrap();
    drop(file);

    let config = EngineConfig::from_file(&config_path).unwrap();
    assert_eq!(config.refresh.interval_seconds, 60);
    let service = start(config).await;

    let reply = service.discover("clusters", request("envoy-1", CLUSTER, "0")).await;
    assert_eq!(reply.status.as_u16(), 200);
    assert_eq!(resource_names(&reply), vec!["svcA"]);
}
