//! # xds-ctl
//!
//! Operator command line for the discovery engine:
//!
//! - `keygen` - Generate a credential encryption key
//! - `encrypt` - Turn a secret into a credential token for node metadata
//! - `decrypt` - Check what a credential token decrypts to
//! - `discover` - Run one discovery request against a configuration and
//!   print the reply

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use xds_core::{DiscoveryRequest, Node};
use xds_engine::{AesGcmCipher, DiscoveryCall, DiscoveryReply, DiscoveryService, EngineConfig, ReplyBody};

/// Operator tool for the discovery engine
#[derive(Parser, Debug)]
#[command(name = "xds-ctl")]
#[command(about = "Operator tool for the discovery engine", long_about = None)]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new encryption key
    Keygen,

    /// Encrypt a secret into a credential token
    Encrypt {
        /// Plaintext secret
        secret: String,
        /// Encryption key (defaults to XDS_ENCRYPTION_KEY)
        #[arg(short, long, env = "XDS_ENCRYPTION_KEY", hide_env_values = true)]
        key: String,
    },

    /// Decrypt a credential token
    Decrypt {
        /// Credential token
        token: String,
        /// Encryption key (defaults to XDS_ENCRYPTION_KEY)
        #[arg(short, long, env = "XDS_ENCRYPTION_KEY", hide_env_values = true)]
        key: String,
    },

    /// Run one discovery request and print the reply as JSON
    Discover {
        /// Configuration file (defaults to XDS_CONFIG or config/discovery.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Resource type to request
        #[arg(short = 't', long, default_value = "clusters")]
        resource_type: String,
        /// Node partition
        #[arg(long)]
        cluster: String,
        /// Node build version, `revision/version/...`
        #[arg(long, default_value = "cli/1.0/RELEASE")]
        build_version: String,
        /// Node id
        #[arg(long, default_value = "xds-ctl")]
        node_id: String,
        /// Version the client holds
        #[arg(long, default_value = "0")]
        version_info: String,
        /// Requested resource names, comma-separated
        #[arg(long, value_delimiter = ',')]
        resource_names: Vec<String>,
        /// Credential token for node metadata
        #[arg(long)]
        auth: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // stdout carries command output, logs go to stderr
    let level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(io::stderr)
        .init();

    match args.command {
        Command::Keygen => {
            let key = AesGcmCipher::generate_key().context("failed to generate key")?;
            println!("{key}");
        }
        Command::Encrypt { secret, key } => {
            let cipher = AesGcmCipher::new(&key).context("invalid encryption key")?;
            println!("{}", cipher.encrypt(&secret)?);
        }
        Command::Decrypt { token, key } => {
            let cipher = AesGcmCipher::new(&key).context("invalid encryption key")?;
            println!("{}", cipher.decrypt_token(&token)?);
        }
        Command::Discover {
            config,
            resource_type,
            cluster,
            build_version,
            node_id,
            version_info,
            resource_names,
            auth,
        } => {
            let config = match config {
                Some(path) => EngineConfig::from_file(&path)
                    .with_context(|| format!("failed to load {}", path.display()))?,
                None => EngineConfig::load().context("failed to load configuration")?,
            };
            debug!(?config, "loaded configuration");

            let mut node = Node::new(node_id, cluster, build_version);
            if let Some(auth) = auth {
                node = node.with_metadata("auth", auth);
            }
            let request = DiscoveryRequest::new(node)
                .with_resource_names(resource_names)
                .with_version(version_info);

            let reply = discover(config, DiscoveryCall::new(resource_type, request)).await?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }

    Ok(())
}

async fn discover(config: EngineConfig, call: DiscoveryCall) -> Result<Value> {
    let service = DiscoveryService::from_config(config).await?;
    service.start().await?;
    info!(resource_type = %call.resource_type, "sending discovery request");
    let reply = service.handle(call).await;
    service.shutdown();
    reply_json(&reply)
}

fn reply_json(reply: &DiscoveryReply) -> Result<Value> {
    let headers: Map<String, Value> = reply
        .metadata
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            let value = value.to_str().ok()?;
            Some((name.to_string(), Value::from(value)))
        })
        .collect();

    let body = match &reply.body {
        ReplyBody::Empty => Value::Null,
        ReplyBody::Response(response) => serde_json::to_value(response)?,
        ReplyBody::Error(error) => serde_json::to_value(error)?,
    };

    Ok(json!({
        "status": reply.status.as_u16(),
        "headers": headers,
        "body": body,
    }))
}
