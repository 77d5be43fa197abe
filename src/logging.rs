//! Logging Setup
//!
//! Installs the global `tracing` subscriber. The level comes from the
//! configuration unless `RUST_LOG` is set, in which case that wins.

use crate::config::LoggingConfig;
use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;
use tracing::Level;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    File(String),
}

impl LogOutput {
    /// `""` and `"stdout"` mean stdout; anything else is a file path.
    pub fn from_config(output: &str) -> Self {
        match output {
            "" | "stdout" => LogOutput::Stdout,
            path => LogOutput::File(path.to_string()),
        }
    }
}

/// Builds the env filter: `RUST_LOG` if present, otherwise `level`.
fn env_filter(level: Level) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(level).into())
        .from_env_lossy()
}

/// Installs the global subscriber.
///
/// Fails if the log file cannot be opened or a subscriber is already set.
pub fn init(config: &LoggingConfig, level: Level) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    match LogOutput::from_config(&config.output) {
        LogOutput::Stdout => builder
            .with_writer(io::stdout)
            .try_init()
            .map_err(anyhow::Error::msg)?,
        LogOutput::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|e| anyhow::anyhow!("failed open log file {}: {}", path, e))?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
                .map_err(anyhow::Error::msg)?
        }
    }

    Ok(())
}
