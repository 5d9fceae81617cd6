//! TOML-based configuration for the relay server.
//!
//! The server runs fine with no file at all; every field has a default.  A
//! config file only needs the keys it wants to change:
//!
//! ```toml
//! log_level = "debug"
//!
//! [network]
//! bind_address = "0.0.0.0"
//! port = 12345
//! bind_attempts = 10
//!
//! [relay]
//! history_capacity = 500
//! read_timeout_secs = 600
//! write_timeout_secs = 5
//! outbound_queue = 256
//! ```
//!
//! Leaving out `history_capacity` or `read_timeout_secs` (or setting either to
//! `0`) means "unbounded" and "no timeout".  Writes to a peer time out after
//! 10 seconds unless `write_timeout_secs` says otherwise; `0` disables it.

use std::net::IpAddr;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::infrastructure::network::stream_recipient::DEFAULT_OUTBOUND_QUEUE;

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// `bind_address` is not an IP address.
    #[error("invalid bind address {0:?}")]
    InvalidBindAddress(String),
}

/// Top-level server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Default log filter when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Where the server listens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Total number of consecutive ports to try, starting at `port`.
    #[serde(default = "default_bind_attempts")]
    pub bind_attempts: u16,
}

/// Relay behaviour.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
    #[serde(
        default = "default_write_timeout_secs",
        skip_serializing_if = "Option::is_none"
    )]
    pub write_timeout_secs: Option<u64>,
    /// Frames a slow peer may fall behind before it is disconnected.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    12345
}
fn default_bind_attempts() -> u16 {
    10
}
fn default_write_timeout_secs() -> Option<u64> {
    Some(10)
}
fn default_outbound_queue() -> usize {
    DEFAULT_OUTBOUND_QUEUE
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            network: NetworkConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            read_timeout_secs: None,
            write_timeout_secs: default_write_timeout_secs(),
            outbound_queue: default_outbound_queue(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            bind_attempts: default_bind_attempts(),
        }
    }
}

impl ServerConfig {
    /// Parses `network.bind_address`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidBindAddress`] if it is not an IP address.
    pub fn bind_ip(&self) -> Result<IpAddr, ConfigError> {
        self.network
            .bind_address
            .parse()
            .map_err(|_| ConfigError::InvalidBindAddress(self.network.bind_address.clone()))
    }

    /// History cap; `None` (also for `0`) means unbounded.
    pub fn history_capacity(&self) -> Option<NonZeroUsize> {
        self.relay.history_capacity.and_then(NonZeroUsize::new)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.relay.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        secs_to_timeout(self.relay.write_timeout_secs)
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn secs_to_timeout(secs: Option<u64>) -> Option<Duration> {
    secs.filter(|s| *s > 0).map(Duration::from_secs)
}

/// Loads configuration from `path`.
///
/// Returns `ServerConfig::default()` if the file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ServerConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_listens_on_12345_everywhere() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.network.port, 12345);
        assert_eq!(cfg.network.bind_attempts, 10);
        assert_eq!(cfg.bind_ip().unwrap(), IpAddr::from([0, 0, 0, 0]));
        assert!(cfg.history_capacity().is_none());
        assert!(cfg.read_timeout().is_none());
        assert_eq!(cfg.write_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.relay.outbound_queue, 256);
    }

    #[test]
    fn test_partial_toml_fills_in_defaults() {
        // Arrange
        let text = r#"
            [network]
            port = 4000

            [relay]
            history_capacity = 50
        "#;

        // Act
        let cfg: ServerConfig = toml::from_str(text).unwrap();

        // Assert
        assert_eq!(cfg.network.port, 4000);
        assert_eq!(cfg.network.bind_address, "0.0.0.0");
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.history_capacity(), NonZeroUsize::new(50));
        assert_eq!(cfg.write_timeout(), Some(Duration::from_secs(10)));
        assert_eq!(cfg.relay.outbound_queue, DEFAULT_OUTBOUND_QUEUE);
    }

    #[test]
    fn test_zero_values_mean_disabled() {
        let cfg: ServerConfig = toml::from_str(
            "[relay]\nhistory_capacity = 0\nread_timeout_secs = 0\nwrite_timeout_secs = 3\n",
        )
        .unwrap();

        assert!(cfg.history_capacity().is_none());
        assert!(cfg.read_timeout().is_none());
        assert_eq!(cfg.write_timeout(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn test_zero_write_timeout_disables_it() {
        let cfg: ServerConfig =
            toml::from_str("[relay]\nwrite_timeout_secs = 0\noutbound_queue = 8\n").unwrap();

        assert!(cfg.write_timeout().is_none());
        assert_eq!(cfg.relay.outbound_queue, 8);
    }

    #[test]
    fn test_invalid_bind_address_is_reported() {
        let mut cfg = ServerConfig::default();
        cfg.network.bind_address = "not-an-ip".into();

        assert!(matches!(
            cfg.bind_ip(),
            Err(ConfigError::InvalidBindAddress(addr)) if addr == "not-an-ip"
        ));
    }

    #[test]
    fn test_to_toml_parses_back_to_same_config() {
        let mut cfg = ServerConfig::default();
        cfg.relay.read_timeout_secs = Some(30);

        let text = cfg.to_toml().unwrap();
        let parsed: ServerConfig = toml::from_str(&text).unwrap();

        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let path = std::env::temp_dir().join("lanchat-no-such-config-8f3a.toml");
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn test_malformed_file_is_parse_error() {
        // Arrange
        let path = std::env::temp_dir().join(format!("lanchat-bad-{}.toml", std::process::id()));
        std::fs::write(&path, "[network\nport = ").unwrap();

        // Act
        let result = load_config(&path);
        let _ = std::fs::remove_file(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
