//! Configuration for the Gibson client
//!
//! Centralized configuration with sensible defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GibsonError;
use crate::protocol::ProtocolVariant;

/// Default TCP port of a Gibson server
pub const DEFAULT_PORT: u16 = 10128;

/// Main configuration for a Gibson client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Target Configuration
    // -------------------------------------------------------------------------
    /// Server to talk to (TCP or unix socket)
    pub address: Address,

    /// Reply layout spoken by the server
    pub protocol: ProtocolVariant,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP connect timeout (milliseconds, 0 = OS default)
    pub connect_timeout_ms: u64,

    /// Socket read timeout (milliseconds, 0 = block forever)
    pub read_timeout_ms: u64,

    /// Socket write timeout (milliseconds, 0 = block forever)
    pub write_timeout_ms: u64,

    /// Disable Nagle's algorithm on TCP sockets
    pub nodelay: bool,

    // -------------------------------------------------------------------------
    // Protocol Limits
    // -------------------------------------------------------------------------
    /// Largest reply payload accepted before allocation (bytes)
    pub max_reply_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: Address::default(),
            protocol: ProtocolVariant::Encoded,
            connect_timeout_ms: 0,
            read_timeout_ms: 0,
            write_timeout_ms: 0,
            nodelay: true,
            max_reply_size: 128 * 1024 * 1024, // 128 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the server address
    pub fn address(mut self, address: Address) -> Self {
        self.config.address = address;
        self
    }

    /// Target a TCP `host:port`
    pub fn tcp(mut self, addr: impl Into<String>) -> Self {
        self.config.address = Address::Tcp(addr.into());
        self
    }

    /// Target a unix domain socket
    pub fn unix(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.address = Address::Unix(path.into());
        self
    }

    /// Set the reply layout
    pub fn protocol(mut self, protocol: ProtocolVariant) -> Self {
        self.config.protocol = protocol;
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    pub fn nodelay(mut self, nodelay: bool) -> Self {
        self.config.nodelay = nodelay;
        self
    }

    /// Set the largest reply payload accepted (in bytes)
    pub fn max_reply_size(mut self, size: u32) -> Self {
        self.config.max_reply_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

/// Where a Gibson server listens
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Address {
    /// `host:port`
    Tcp(String),

    /// Path of a unix domain socket
    Unix(PathBuf),
}

impl Default for Address {
    fn default() -> Self {
        Address::Tcp(format!("127.0.0.1:{}", DEFAULT_PORT))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Tcp(addr) => write!(f, "{}", addr),
            Address::Unix(path) => write!(f, "unix:{}", path.display()),
        }
    }
}

impl FromStr for Address {
    type Err = GibsonError;

    /// Accepts `unix:/path`, an absolute path, `host:port`, or a bare host
    /// (which gets the default port).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(GibsonError::Config("empty address".to_string()));
        }

        if let Some(path) = s.strip_prefix("unix:") {
            if path.is_empty() {
                return Err(GibsonError::Config("empty unix socket path".to_string()));
            }
            return Ok(Address::Unix(PathBuf::from(path)));
        }
        if s.starts_with('/') {
            return Ok(Address::Unix(PathBuf::from(s)));
        }

        match s.rsplit_once(':') {
            Some((host, port)) if !host.is_empty() => {
                port.parse::<u16>().map_err(|_| {
                    GibsonError::Config(format!("invalid port in address '{}'", s))
                })?;
                Ok(Address::Tcp(s.to_string()))
            }
            Some(_) => Err(GibsonError::Config(format!("missing host in address '{}'", s))),
            None => Ok(Address::Tcp(format!("{}:{}", s, DEFAULT_PORT))),
        }
    }
}
