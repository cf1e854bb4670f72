//! Configuration loading and management.

use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity and listen address.
    pub server: ServerConfig,
    /// Presence tracking configuration.
    #[serde(default)]
    pub presence: PresenceConfig,
    /// Bearer token configuration.
    pub auth: AuthConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name shown in logs and the root endpoint (e.g., "kiezwache.berlin").
    pub name: String,
    /// Address the HTTP API and WebSocket listener binds to.
    pub listen: SocketAddr,
    /// Prometheus metrics HTTP port (default: 9090, 0 disables).
    pub metrics_port: Option<u16>,
}

/// Presence tracking configuration.
///
/// A user with no heartbeat, no heartbeat-equivalent activity, and no live
/// connection for longer than the threshold is considered offline. Eviction
/// is lazy: stale entries are reconciled when the online list is read, not
/// by a background timer.
#[derive(Debug, Clone, Deserialize)]
pub struct PresenceConfig {
    /// Seconds without activity before a user is considered offline (default: 120).
    #[serde(default = "default_offline_threshold_secs")]
    pub offline_threshold_secs: u64,
    /// Outbound event queue capacity per connection (default: 64).
    /// Events beyond this are dropped for that connection, never queued.
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
}

impl PresenceConfig {
    /// Offline threshold as a [`Duration`].
    pub fn offline_threshold(&self) -> Duration {
        Duration::from_secs(self.offline_threshold_secs)
    }
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            offline_threshold_secs: default_offline_threshold_secs(),
            send_queue_capacity: default_send_queue_capacity(),
        }
    }
}

fn default_offline_threshold_secs() -> u64 {
    120
}

fn default_send_queue_capacity() -> usize {
    64
}

/// Bearer token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Secret used to sign bearer tokens. Must be changed from the placeholder.
    pub token_secret: String,
    /// Token lifetime in minutes (default: 30).
    #[serde(default = "default_token_ttl_minutes")]
    pub token_ttl_minutes: i64,
}

fn default_token_ttl_minutes() -> i64 {
    30
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite database path, or ":memory:" for an in-memory database.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "kiezwache.db".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml = r#"
            [server]
            name = "test.kiezwache"
            listen = "127.0.0.1:8080"

            [auth]
            token_secret = "test-secret"
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.name, "test.kiezwache");
        assert_eq!(config.presence.offline_threshold_secs, 120);
        assert_eq!(config.auth.token_ttl_minutes, 30);
        assert_eq!(config.database.path, "kiezwache.db");
    }

    #[test]
    fn presence_threshold_override() {
        let toml = r#"
            [server]
            name = "test.kiezwache"
            listen = "127.0.0.1:8080"

            [presence]
            offline_threshold_secs = 30

            [auth]
            token_secret = "test-secret"
            token_ttl_minutes = 5
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.presence.offline_threshold(),
            Duration::from_secs(30)
        );
        assert_eq!(config.auth.token_ttl_minutes, 5);
    }
}
