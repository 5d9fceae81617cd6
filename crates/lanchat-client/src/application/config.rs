//! Client connection settings.

use std::net::Ipv6Addr;

/// Default server port, shared with `lanchat-server`.
pub const DEFAULT_PORT: u16 = 12345;

/// Where to connect and as whom.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    /// `None` means "ask at the prompt".
    pub username: Option<String>,
    /// Colour system lines with ANSI escapes.
    pub color: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            username: None,
            color: true,
        }
    }
}

impl ClientConfig {
    /// `host:port`, with IPv6 literals bracketed.
    pub fn server_addr(&self) -> String {
        if self.host.parse::<Ipv6Addr>().is_ok() {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
