//! Configuration file support for the probe driver

use rutp::StreamConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Which end of the stream this process plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Accepts a client and receives
    Server,
    /// Connects to a server and sends
    Client,
}

/// Probe configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeConfig {
    pub role: Role,
    /// Test duration in seconds
    #[serde(default = "default_duration")]
    pub duration_secs: u64,
    /// Statistics interval in seconds
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
    /// Stream settings
    #[serde(default)]
    pub stream: StreamConfig,
}

fn default_duration() -> u64 {
    10
}

fn default_stats_interval() -> u64 {
    1
}

impl ProbeConfig {
    /// Load configuration from TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config: ProbeConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.stream.validate()?;
        if self.role == Role::Client && self.stream.server.is_none() {
            return Err(ConfigError::Invalid(
                "client role needs a server address".to_string(),
            ));
        }
        if self.stats_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "statistics interval must be at least one second".to_string(),
            ));
        }
        Ok(())
    }

    /// Create example client configuration
    pub fn example_client() -> Self {
        ProbeConfig {
            role: Role::Client,
            duration_secs: default_duration(),
            stats_interval_secs: default_stats_interval(),
            stream: StreamConfig {
                server: "192.0.2.10:5201".parse().ok(),
                rate_bps: 1_000_000,
                ..Default::default()
            },
        }
    }

    /// Create example server configuration
    pub fn example_server() -> Self {
        ProbeConfig {
            role: Role::Server,
            duration_secs: default_duration(),
            stats_interval_secs: default_stats_interval(),
            stream: StreamConfig::default(),
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("Invalid stream settings: {0}")]
    Stream(#[from] rutp::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_configs() {
        let client = ProbeConfig::example_client();
        assert_eq!(client.role, Role::Client);
        assert!(client.validate().is_ok());

        let server = ProbeConfig::example_server();
        assert!(server.validate().is_ok());
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = ProbeConfig::example_client();
        let toml = toml::to_string(&config).unwrap();
        let parsed: ProbeConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_minimal_toml_uses_defaults() {
        let parsed: ProbeConfig = toml::from_str(
            r#"
            role = "server"

            [stream]
            block_size = 1200
            counters_64bit = true
            "#,
        )
        .unwrap();
        assert_eq!(parsed.duration_secs, 10);
        assert_eq!(parsed.stream.block_size, 1200);
        assert!(parsed.stream.counters_64bit);
        assert_eq!(parsed.stream.connect_timeout_secs, 30);
    }

    #[test]
    fn test_client_without_server_is_invalid() {
        let config = ProbeConfig {
            role: Role::Client,
            ..ProbeConfig::example_server()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
