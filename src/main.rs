//! MQTT Authorization Agent CLI
//!
//! Loads the user and policy configuration and serves broker hook requests.

use anyhow::{Context, Result};
use clap::Parser;
use mqtt_authz_agent::auth::hash_password;
use mqtt_authz_agent::server::HookServer;
use mqtt_authz_agent::{AuthzAgent, AuthzConfig};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// MQTT authorization agent
#[derive(Parser, Debug)]
#[command(name = "mqtt-authz-agent")]
#[command(version)]
#[command(about = "Topic-level authorization hooks for an MQTT broker", long_about = None)]
struct Args {
    /// Configuration file path (JSON)
    #[arg(short, long, required_unless_present = "hash_password")]
    config: Option<PathBuf>,

    /// Override the port from the configuration file
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Enable JSON log format
    #[arg(long)]
    json_logs: bool,

    /// Include presented passwords in connect log events
    #[arg(long)]
    log_credentials: bool,

    /// Validate the configuration and exit
    #[arg(long)]
    check: bool,

    /// Print a bcrypt hash for a `passwordHash` entry and exit
    #[arg(long, value_name = "PASSWORD")]
    hash_password: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(password) = &args.hash_password {
        println!("{}", hash_password(password)?);
        return Ok(());
    }

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    if args.json_logs {
        fmt().json().with_env_filter(filter).with_target(true).init();
    } else {
        fmt().with_env_filter(filter).with_target(true).init();
    }

    let config_path = args
        .config
        .as_ref()
        .context("--config is required")?;

    info!(path = %config_path.display(), "Loading configuration from file");
    let mut config = AuthzConfig::from_file(config_path)?;

    if let Some(port) = args.port {
        config.port = port;
    }
    if args.log_credentials {
        config.general.log_credentials = true;
    }

    let agent = AuthzAgent::with_config(&config)?;

    if args.check {
        info!(users = agent.directory().len(), "Configuration is valid");
        return Ok(());
    }

    let address: IpAddr = config
        .general
        .bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.general.bind_address))?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = config.port,
        log_credentials = config.general.log_credentials,
        evict_on_disconnect = config.general.evict_on_disconnect,
        "Starting MQTT authorization agent"
    );

    let server = HookServer::bind(SocketAddr::new(address, config.port), Arc::new(agent)).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => info!("Shutdown signal received"),
    }

    Ok(())
}
