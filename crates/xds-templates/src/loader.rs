//! Template directory loading.
//!
//! Layout: one directory per band, one file per resource type.
//!
//! ```text
//! templates/
//!   default/
//!     clusters.yaml
//!     listeners.yaml
//!   1.15/
//!     clusters.yaml
//!     listeners.yaml
//! ```

use std::path::Path;

use tokio::fs;
use tracing::{debug, info};
use xds_core::{XdsError, XdsResult};

use crate::registry::TemplateRegistryBuilder;
use crate::renderer::StaticRenderer;
use crate::template::XdsTemplate;

const TEMPLATE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Load every template under `dir` into a registry builder.
///
/// Files with other extensions are ignored. Checksums are taken from the
/// file bytes. The caller builds (and so validates) the registry, which lets
/// built-in templates fill gaps first.
///
/// # Errors
///
/// Returns [`XdsError::Configuration`] if the directory or a template file
/// cannot be read or is not UTF-8.
pub async fn load_directory(dir: impl AsRef<Path>) -> XdsResult<TemplateRegistryBuilder> {
    let dir = dir.as_ref();
    let mut builder = TemplateRegistryBuilder::default();
    let mut loaded = 0usize;

    let mut bands = fs::read_dir(dir).await.map_err(|e| read_error(dir, e))?;
    while let Some(band_entry) = bands.next_entry().await.map_err(|e| read_error(dir, e))? {
        let band_path = band_entry.path();
        // follows symlinks, so a linked band directory still loads
        let metadata = fs::metadata(&band_path)
            .await
            .map_err(|e| read_error(&band_path, e))?;
        if !metadata.is_dir() {
            continue;
        }
        let Some(band) = band_path.file_name().and_then(|n| n.to_str()).map(str::to_string)
        else {
            continue;
        };

        let mut files = fs::read_dir(&band_path)
            .await
            .map_err(|e| read_error(&band_path, e))?;
        while let Some(file_entry) = files
            .next_entry()
            .await
            .map_err(|e| read_error(&band_path, e))?
        {
            let path = file_entry.path();
            let extension = path.extension().and_then(|e| e.to_str());
            if !extension.is_some_and(|e| TEMPLATE_EXTENSIONS.contains(&e)) {
                continue;
            }
            let Some(resource_type) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };

            let bytes = fs::read(&path).await.map_err(|e| read_error(&path, e))?;
            let source = String::from_utf8(bytes).map_err(|_| {
                XdsError::Configuration(format!("template {} is not UTF-8", path.display()))
            })?;
            let template = XdsTemplate::new(StaticRenderer::new(source.clone()), source.as_bytes())
                .with_origin(path.display().to_string());

            debug!(
                band = %band,
                resource_type = %resource_type,
                checksum = %template.checksum(),
                "loaded template"
            );
            builder.insert(band.clone(), resource_type, template);
            loaded += 1;
        }
    }

    info!(dir = %dir.display(), templates = loaded, "loaded template directory");
    Ok(builder)
}

fn read_error(path: &Path, err: std::io::Error) -> XdsError {
    XdsError::Configuration(format!("cannot read templates at {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use xds_core::{ContentChecksum, DiscoveryRequest, Node, RenderingContext};

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[tokio::test]
    async fn loads_bands_and_types() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default/clusters.yaml", "resources: []\n");
        write(dir.path(), "default/listeners.json", r#"{"resources": [{"name": "l"}]}"#);
        write(dir.path(), "default/README.md", "ignored");
        write(dir.path(), "1.15/clusters.yml", "resources: []\n");
        write(dir.path(), "1.15/listeners.yaml", "resources: []\n");

        let registry = load_directory(dir.path()).await.unwrap().build().unwrap();
        assert_eq!(registry.len(), 4);
        assert_eq!(registry.bands().collect::<Vec<_>>(), vec!["1.15", "default"]);

        let listeners = registry.resolve("1.9", &"listeners".into()).unwrap();
        assert_eq!(
            listeners.checksum(),
            ContentChecksum::of(br#"{"resources": [{"name": "l"}]}"#)
        );
        let request = DiscoveryRequest::new(Node::new("n1", "T1", "abc/1.9/RELEASE"));
        let resources = listeners
            .render(&RenderingContext::default(), &request)
            .await
            .unwrap();
        assert_eq!(resources.len(), 1);
    }

    #[tokio::test]
    async fn files_beside_bands_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "default/clusters.yaml", "resources: []\n");
        write(dir.path(), "clusters.yaml", "resources: [stray]\n");

        let registry = load_directory(dir.path()).await.unwrap().build().unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.bands().collect::<Vec<_>>(), vec!["default"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn linked_band_directory_loads() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        write(dir.path(), "default/clusters.yaml", "resources: []\n");
        write(elsewhere.path(), "clusters.yaml", "resources: []\n");
        std::os::unix::fs::symlink(elsewhere.path(), dir.path().join("1.15")).unwrap();

        let registry = load_directory(dir.path()).await.unwrap().build().unwrap();
        assert_eq!(registry.bands().collect::<Vec<_>>(), vec!["1.15", "default"]);
    }

    #[tokio::test]
    async fn missing_default_band_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "1.15/clusters.yaml", "resources: []\n");

        let err = load_directory(dir.path()).await.unwrap().build().unwrap_err();
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn missing_directory_is_configuration_error() {
        let err = load_directory("/no/such/templates").await.unwrap_err();
        assert!(matches!(err, XdsError::Configuration(_)));
    }
}
