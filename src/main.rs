//! linekv - server binary
//!
//! Loads configuration, sets up logging, binds the listener and serves
//! until Ctrl+C or SIGTERM.

use anyhow::Context;
use clap::Parser;
use linekv::commands::{CommandHandler, QueryExecutor};
use linekv::config::{parse_duration, Config};
use linekv::server::Server;
use linekv::storage::StorageEngine;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// A volatile key-value store served over a line-oriented text protocol.
#[derive(Parser, Debug)]
#[command(name = "linekv", version, about, long_about = None)]
struct Args {
    /// YAML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file.
    #[arg(short, long)]
    address: Option<String>,

    /// Maximum concurrent connections (0 = unbounded).
    #[arg(long)]
    max_connections: Option<usize>,

    /// Idle timeout, e.g. 30s or 5m (0 = never).
    #[arg(long)]
    idle_timeout: Option<String>,

    /// Log level: trace, debug, info, warn or error.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    /// Loads the configuration file (if any) and applies flag overrides.
    fn into_config(self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };

        if let Some(address) = self.address {
            config.network.address = address;
        }
        if let Some(max_connections) = self.max_connections {
            config.network.max_connections = max_connections;
        }
        if let Some(idle_timeout) = self.idle_timeout {
            parse_duration(&idle_timeout)?;
            config.network.idle_timeout = idle_timeout;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Args::parse()
        .into_config()
        .context("failed load config")?;

    linekv::logging::init(&config.logging, config.log_level()?).context("failed init logger")?;

    let server_config = config.server_config()?;

    // Create the storage engine (shared across all connections)
    let storage = Arc::new(StorageEngine::new());
    let executor: Arc<dyn QueryExecutor> = Arc::new(CommandHandler::new(storage));

    let listener = TcpListener::bind(&config.network.address)
        .await
        .with_context(|| format!("failed init server on {}", config.network.address))?;

    info!(
        version = linekv::VERSION,
        addr = %config.network.address,
        max_connections = server_config.max_connections,
        max_message_size = server_config.max_message_size,
        idle_timeout = ?server_config.idle_timeout,
        "linekv starting"
    );

    Server::new(listener, executor, server_config)
        .run(shutdown_signal())
        .await;

    info!("Server shutdown complete");
    Ok(())
}
