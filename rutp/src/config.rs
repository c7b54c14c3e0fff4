//! Stream configuration

use rutp_io::TunerSettings;
use rutp_protocol::{CounterWidth, ProxyAddress, MIN_DATAGRAM_LEN};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Largest UDP payload over IPv4
pub const MAX_BLOCK_SIZE: usize = 65507;

/// Default datagram size
pub const DEFAULT_BLOCK_SIZE: usize = 1460;

/// Default server port
pub const DEFAULT_PORT: u16 = 5201;

/// Settings shared by both ends of a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Datagram size; every data datagram is sent at exactly this length
    #[serde(default = "default_block_size")]
    pub block_size: usize,
    /// Explicit socket buffer size (0 = platform default)
    #[serde(default)]
    pub socket_bufsize: usize,
    /// Use 64-bit packet counters (both ends must agree)
    #[serde(default)]
    pub counters_64bit: bool,
    /// Application send rate in bits per second (0 = unlimited)
    #[serde(default)]
    pub rate_bps: u64,
    /// Kernel fair-queue pacing in bits per second (0 = off)
    #[serde(default)]
    pub fq_rate_bps: u64,
    /// Server side: address to listen on
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,
    /// Client side: server to connect to
    #[serde(default)]
    pub server: Option<SocketAddr>,
    /// Client side: optional local bind address
    #[serde(default)]
    pub local: Option<SocketAddr>,
    /// Destination hint carried in every header
    #[serde(default)]
    pub proxy: Option<SocketAddr>,
    /// How long `connect` waits for the server's acknowledgement
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_block_size() -> usize {
    DEFAULT_BLOCK_SIZE
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT))
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for StreamConfig {
    fn default() -> Self {
        StreamConfig {
            block_size: default_block_size(),
            socket_bufsize: 0,
            counters_64bit: false,
            rate_bps: 0,
            fq_rate_bps: 0,
            listen: default_listen(),
            server: None,
            local: None,
            proxy: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl StreamConfig {
    /// Check sizes and addresses before any socket is created
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size < MIN_DATAGRAM_LEN {
            return Err(ConfigError::BlockSizeTooSmall {
                size: self.block_size,
                min: MIN_DATAGRAM_LEN,
            });
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::BlockSizeTooLarge {
                size: self.block_size,
                max: MAX_BLOCK_SIZE,
            });
        }
        if self.socket_bufsize > i32::MAX as usize {
            return Err(ConfigError::BufferSize(self.socket_bufsize));
        }
        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ConnectTimeout);
        }
        if let (Some(server), Some(local)) = (self.server, self.local) {
            if server.is_ipv4() != local.is_ipv4() {
                return Err(ConfigError::AddressFamily { server, local });
            }
        }
        Ok(())
    }

    pub fn counter_width(&self) -> CounterWidth {
        CounterWidth::from_flag(self.counters_64bit)
    }

    /// Proxy hint, falling back to `fallback` (typically the peer)
    pub fn proxy_or(&self, fallback: Option<SocketAddr>) -> Option<ProxyAddress> {
        self.proxy.or(fallback).map(ProxyAddress::from)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn tuner_settings(&self) -> TunerSettings {
        TunerSettings {
            socket_bufsize: self.socket_bufsize,
            block_size: self.block_size,
            fq_rate_bps: self.fq_rate_bps,
            rate_bps: self.rate_bps,
        }
    }
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Block size {size} is below the minimum of {min}")]
    BlockSizeTooSmall { size: usize, min: usize },

    #[error("Block size {size} exceeds the maximum of {max}")]
    BlockSizeTooLarge { size: usize, max: usize },

    #[error("Invalid socket buffer size: {0}")]
    BufferSize(usize),

    #[error("Connect timeout must be at least one second")]
    ConnectTimeout,

    #[error("No server address configured")]
    MissingServer,

    #[error("Server {server} and local {local} addresses are of different families")]
    AddressFamily {
        server: SocketAddr,
        local: SocketAddr,
    },
}
