//! File-system storage adapters.

pub mod config;

pub use config::{load_config, ConfigError, NetworkConfig, RelayConfig, ServerConfig};
