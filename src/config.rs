//! Server Configuration
//!
//! The server reads an optional YAML file. Every section and every field
//! may be omitted; missing values take the defaults below.
//!
//! ```yaml
//! engine:
//!   type: in_memory
//! network:
//!   address: 127.0.0.1:8080
//!   max_connections: 50      # 0 = unbounded
//!   max_message_size: 2KB    # B, KB, MB, GB, KiB, MiB, GiB; 0 = unlimited
//!   idle_timeout: 1m         # ms, s, m, h (may be combined: 1m30s); 0 = never
//! logging:
//!   level: info
//!   output: stdout           # or a file path, appended to
//! ```

use crate::server::ServerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

/// The only storage engine there is.
pub const ENGINE_IN_MEMORY: &str = "in_memory";

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed read file: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed parse yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid size: {0:?}")]
    InvalidSize(String),

    #[error("invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("unsupported engine type: {0:?}")]
    UnsupportedEngine(String),

    #[error("unexpected log level: {0:?}")]
    InvalidLevel(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: ENGINE_IN_MEMORY.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NetworkConfig {
    pub address: String,
    pub max_connections: usize,
    pub max_message_size: String,
    pub idle_timeout: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: crate::DEFAULT_ADDRESS.to_string(),
            max_connections: 50,
            max_message_size: "2KB".to_string(),
            idle_timeout: "1m".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub output: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: "stdout".to_string(),
        }
    }
}

impl Config {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text)
    }

    /// Parses and validates YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes to unit, not to a mapping
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks every field that is stored as text.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.kind != ENGINE_IN_MEMORY {
            return Err(ConfigError::UnsupportedEngine(self.engine.kind.clone()));
        }
        self.server_config()?;
        self.log_level()?;
        Ok(())
    }

    /// The limits handed to the acceptor.
    pub fn server_config(&self) -> Result<ServerConfig, ConfigError> {
        Ok(ServerConfig {
            max_connections: self.network.max_connections,
            max_message_size: parse_size(&self.network.max_message_size)?,
            idle_timeout: parse_duration(&self.network.idle_timeout)?,
        })
    }

    /// The configured log level.
    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.logging
            .level
            .parse()
            .map_err(|_| ConfigError::InvalidLevel(self.logging.level.clone()))
    }
}

/// Parses a human-readable byte size such as `2KB`, `512 KiB` or `1024`.
///
/// Decimal units are powers of 1000, binary units powers of 1024.
pub fn parse_size(text: &str) -> Result<usize, ConfigError> {
    let invalid = || ConfigError::InvalidSize(text.to_string());

    let trimmed = text.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    let number: usize = number.parse().map_err(|_| invalid())?;
    let multiplier: usize = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" => 1000,
        "m" | "mb" => 1000 * 1000,
        "g" | "gb" => 1000 * 1000 * 1000,
        "ki" | "kib" => 1 << 10,
        "mi" | "mib" => 1 << 20,
        "gi" | "gib" => 1 << 30,
        _ => return Err(invalid()),
    };

    number.checked_mul(multiplier).ok_or_else(invalid)
}

/// Parses a duration such as `1m`, `30s`, `250ms` or `1h30m`.
///
/// A bare number is taken as seconds.
pub fn parse_duration(text: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(text.to_string());

    let mut rest = text.trim();
    if rest.is_empty() {
        return Err(invalid());
    }
    if let Ok(secs) = rest.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let value: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Some(Duration::from_millis(value)),
            "s" => Some(Duration::from_secs(value)),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            _ => return Err(invalid()),
        }
        .ok_or_else(invalid)?;
        rest = &rest[unit_len..];
        total = total.checked_add(part).ok_or_else(invalid)?;
    }

    Ok(total)
}
