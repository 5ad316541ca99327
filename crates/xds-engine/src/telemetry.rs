//! Tracing subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use xds_core::{XdsError, XdsResult};

use crate::config::LoggingConfig;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over the configured level. Every event
/// emitted while a request is handled carries the request's `discovery`
/// span, and with it the correlation id.
///
/// # Errors
///
/// Returns [`XdsError::Configuration`] if the level is not a valid filter
/// or a global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> XdsResult<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            XdsError::Configuration(format!("invalid log level {:?}: {e}", config.level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .try_init()
    };

    installed.map_err(|e| XdsError::Configuration(format!("tracing already initialized: {e}")))
}
