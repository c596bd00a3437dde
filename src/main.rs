//! sllp - SLLP control server
//!
//! Serves the variables and curves described by the configuration over TCP.

use clap::Parser;
use sllp_core::{Operation, Variable};
use sllp_server::{CommandHandler, Config, Server, ServerConfig, ServerError};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sllp")]
#[command(about = "SLLP control server", long_about = None)]
#[command(version)]
struct Args {
    /// YAML configuration file
    #[arg(short, long, env = "SLLP_CONFIG")]
    config: Option<PathBuf>,

    /// Address to bind to, overrides the configuration
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

/// Logs the names of the variables a request touched.
fn log_access(op: Operation, variables: &[&Variable]) {
    let names: Vec<&str> = variables
        .iter()
        .map(|var| var.user::<String>().map(String::as_str).unwrap_or("?"))
        .collect();
    tracing::info!("{:?} {}", op, names.join(", "));
}

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => {
            let mut config = Config::from_file(path).map_err(|e| {
                tracing::error!("Failed to load config: {}", e);
                e
            })?;
            config.apply_env_overrides();
            tracing::info!("Loaded config from {}", path.display());
            config
        }
        None => {
            tracing::info!("Using default configuration");
            Config::load()?
        }
    };
    if let Some(bind) = args.bind {
        config.network.bind_addr = bind;
    }
    config.validate()?;

    let registry = config.registry.build()?;

    tracing::info!("Starting sllp server");
    tracing::info!("  Bind address: {}", config.network.bind_addr);
    tracing::info!(
        "  Variables: {}, curves: {}",
        registry.variables().len(),
        registry.curves().len()
    );
    for curve in registry.curves() {
        tracing::info!(
            "  Curve {} ({}): {} blocks, checksum {}",
            curve.id(),
            curve.user::<String>().map(String::as_str).unwrap_or("?"),
            curve.block_count(),
            hex::encode(curve.checksum())
        );
    }

    let handler = CommandHandler::new(registry).with_hook(log_access);
    let server = Arc::new(Server::new(
        ServerConfig::from(&config.network),
        handler,
    ));

    let shutdown_server = server.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, stopping server...");
        shutdown_server.shutdown();
    });

    // Blocks until shutdown
    server.run().await?;

    let stats = server.stats();
    tracing::info!(
        "Server stopped ({} requests, {} errors)",
        stats.requests_total.load(std::sync::atomic::Ordering::Relaxed),
        stats.errors_total.load(std::sync::atomic::Ordering::Relaxed)
    );
    Ok(())
}
