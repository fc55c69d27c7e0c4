//! Monitoring Agent
//!
//! The entry point: parses CLI flags, sets up logging, loads and
//! validates configuration, connects to the bus, starts the check
//! scheduler, and serves the debug endpoint until terminated.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use monitoring_agent::bus::NatsConnector;
use monitoring_agent::config;
use monitoring_agent::scheduler::Scheduler;
use monitoring_agent::vars;

/// Node-resident monitoring agent
#[derive(Parser, Debug)]
#[command(
    name = "monitoring-agent",
    version,
    about = "Publishes DNS-check results and heartbeats for this node"
)]
struct Cli {
    /// The path to the config file
    #[arg(long, default_value = "/etc/monitoring/agent.json")]
    config: PathBuf,

    /// One of trace, debug, info, warn, or error
    #[arg(long, default_value = "info")]
    log_level: String,

    /// The prefix to look for when reading configuration settings from
    /// environment variables
    #[arg(long, default_value = "MONITORING_")]
    env_prefix: String,

    /// The port to listen on for requests to /debug/vars
    #[arg(long, default_value_t = 60000)]
    vars_port: u16,
}

// ---- Main Run ---------------------------------------------------------------

async fn run(cli: Cli) -> Result<()> {
    let mut config = config::load_config(&cli.config)?;
    config::apply_env_overrides(&mut config, &cli.env_prefix);
    config.validate(&cli.env_prefix)?;

    let node = config.node.clone();
    info!("reporting as node {}", node);

    let settings = config.connector_settings();
    info!("NATS TLS cert file is {}", settings.tls_cert_path);
    info!("NATS TLS key file is {}", settings.tls_key_path);
    info!("NATS CA cert file is {}", settings.ca_cert_path);
    info!("NATS creds file is {}", settings.creds_path);

    let connector = Arc::new(
        NatsConnector::connect(&settings)
            .await
            .context("failed to connect to NATS")?,
    );

    let dns_config = config
        .dns_check_config()
        .context("invalid DNS check configuration")?;
    let heartbeat_config = config
        .heartbeat_config()
        .context("invalid heartbeat configuration")?;

    let mut scheduler = Scheduler::start(connector, node.clone(), dns_config, heartbeat_config)
        .await
        .context("failed to start check tasks")?;

    // The debug endpoint keeps the process alive; the check tasks run
    // until the process is terminated.
    tokio::select! {
        result = vars::serve(cli.vars_port, node) => {
            scheduler.stop();
            result
        }
        _ = shutdown_signal() => {
            info!("shutting down");
            scheduler.stop();
            Ok(())
        }
    }
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");

        tokio::select! {
            _ = ctrl_c => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to register Ctrl+C handler");
        info!("received shutdown signal");
    }
}

// ---- Entry Point -----------------------------------------------------------

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = run(cli).await {
        eprintln!("Fatal: {:#}", e);
        std::process::exit(1);
    }
}
