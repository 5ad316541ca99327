//! Engine configuration with layered loading.
//!
//! Configuration is loaded in this order, later layers overriding earlier:
//!
//! 1. Compiled defaults
//! 2. A TOML, YAML or JSON file named by `XDS_CONFIG`
//!    (default `config/discovery.toml`); a missing file is not an error
//! 3. `XDS__SECTION__KEY` environment variables, e.g.
//!    `XDS__REFRESH__INTERVAL_SECONDS=10`; `XDS__AUTH__PASSWORDS` takes a
//!    comma-separated list
//! 4. `XDS_ENCRYPTION_KEY`, which sets `auth.encryption_key`
//!
//! # Example
//!
//! ```toml
//! debug = false
//! source_match_key = "service_clusters"
//!
//! [auth]
//! enabled = true
//! passwords = ["hunter2"]
//!
//! [refresh]
//! interval_seconds = 30
//!
//! [[sources]]
//! type = "file"
//! path = "/etc/xds/instances.yaml"
//!
//! [templates]
//! directory = "/etc/xds/templates"
//!
//! [template_context]
//! region = "eu-west-1"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use xds_core::{RenderingContext, XdsError, XdsResult};
use xds_sources::{SourceConfig, DEFAULT_MATCH_KEY};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "XDS_CONFIG";
/// Environment variable carrying the credential encryption key.
pub const ENCRYPTION_KEY_ENV: &str = "XDS_ENCRYPTION_KEY";
/// Config file used when `XDS_CONFIG` is unset.
pub const DEFAULT_CONFIG_PATH: &str = "config/discovery.toml";

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Expose failure detail and backtraces to callers.
    pub debug: bool,
    /// Credential checking.
    pub auth: AuthConfig,
    /// Source refresh timing.
    pub refresh: RefreshConfig,
    /// Instance record sources.
    pub sources: Vec<SourceConfig>,
    /// Record attribute naming a record's partitions.
    pub source_match_key: String,
    /// Template loading.
    pub templates: TemplatesConfig,
    /// Global variables available to every template.
    pub template_context: Map<String, Value>,
    /// Log output.
    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debug: false,
            auth: AuthConfig::default(),
            refresh: RefreshConfig::default(),
            sources: Vec::new(),
            source_match_key: DEFAULT_MATCH_KEY.to_string(),
            templates: TemplatesConfig::default(),
            template_context: Map::new(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Credential checking settings.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a credential on every request.
    pub enabled: bool,
    /// Accepted plaintext secrets.
    pub passwords: Vec<String>,
    /// URL-safe base64 AES-256 key.
    pub encryption_key: Option<String>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("passwords", &format_args!("[{} redacted]", self.passwords.len()))
            .field(
                "encryption_key",
                &self.encryption_key.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Source refresh settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes.
    pub interval_seconds: u64,
    /// Also trigger a due refresh from incoming requests.
    pub refresh_on_request: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 30,
            refresh_on_request: true,
        }
    }
}

impl RefreshConfig {
    /// Refresh interval.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Template loading settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory of `<band>/<resource type>.yaml` templates. Without one
    /// only the built-in templates are served.
    pub directory: Option<PathBuf>,
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl EngineConfig {
    /// Load from the file named by `XDS_CONFIG`, or `config/discovery.toml`.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] if the configuration cannot be
    /// read, parsed or validated.
    pub fn load() -> XdsResult<Self> {
        let path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    /// Load from `path` with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] if the configuration cannot be
    /// read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> XdsResult<Self> {
        let mut config: Self = Config::builder()
            .add_source(File::with_name(&path.as_ref().to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("XDS")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("auth.passwords")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_error)?
            .try_deserialize()
            .map_err(config_error)?;

        if let Ok(key) = std::env::var(ENCRYPTION_KEY_ENV) {
            config.auth.encryption_key = Some(key);
        }
        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`XdsError::Configuration`] describing the first problem.
    pub fn validate(&self) -> XdsResult<()> {
        if self.refresh.interval_seconds == 0 {
            return Err(invalid("refresh.interval_seconds must be greater than 0"));
        }
        if self.source_match_key.is_empty() {
            return Err(invalid("source_match_key must not be empty"));
        }
        if self.auth.enabled {
            if self.auth.encryption_key.as_deref().map_or(true, str::is_empty) {
                return Err(invalid(
                    "auth is enabled but no encryption key is set (auth.encryption_key or XDS_ENCRYPTION_KEY)",
                ));
            }
            if self.auth.passwords.is_empty() {
                return Err(invalid("auth is enabled but auth.passwords is empty"));
            }
        }
        if let Some(key) = RenderingContext::RESERVED_KEYS
            .iter()
            .find(|key| self.template_context.contains_key(**key))
        {
            return Err(invalid(&format!("template_context.{key} is reserved")));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> XdsError {
    XdsError::Configuration(message.to_string())
}

fn config_error(err: ConfigError) -> XdsError {
    XdsError::Configuration(err.to_string())
}
