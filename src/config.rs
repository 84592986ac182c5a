//! beepnode Configuration
//!
//! This module provides configuration structures for a beepnode
//! replication node. Every field has a default, so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Discovery service name shared by all beep-beep nodes
pub const DEFAULT_SERVICE_NAME: &str = "beep-beep";

/// Main beepnode configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BeepConfig {
    /// Node-specific configuration
    #[serde(default)]
    pub node: NodeConfig,

    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Peer discovery configuration
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Replication configuration
    #[serde(default)]
    pub replication: ReplicationConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Node-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Node identifier, also used to drop our own discovery broadcasts
    #[serde(default = "default_node_id")]
    pub id: String,

    /// Host other nodes should use to reach us (informational)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advertise_host: Option<String>,
}

/// API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Enable HTTP API
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// HTTP API bind address (port 0 picks a free port)
    #[serde(default = "default_api_address")]
    pub bind_address: String,

    /// Enable CORS
    #[serde(default)]
    pub cors_enabled: bool,
}

/// Peer discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Enable UDP broadcast discovery
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Service name identifying our peers on the shared channel
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// UDP port used for announcements
    #[serde(default = "default_discovery_port")]
    pub port: u16,

    /// Announcement interval in milliseconds
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,
}

/// Replication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicationConfig {
    /// Interval between sweeps (and view passes) in milliseconds
    #[serde(default = "default_sync_interval_ms")]
    pub sync_interval_ms: u64,

    /// Per-request timeout for peer HTTP calls, none when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_timeout_ms: Option<u64>,

    /// Seed peers (host:port) added at start
    #[serde(default)]
    pub peers: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (pretty, compact)
    #[serde(default = "default_log_format")]
    pub format: String,
}

// Default value functions
fn default_node_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

fn default_api_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_service_name() -> String {
    DEFAULT_SERVICE_NAME.to_string()
}

fn default_discovery_port() -> u16 {
    7655
}

fn default_broadcast_interval_ms() -> u64 {
    2000
}

fn default_sync_interval_ms() -> u64 {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: default_node_id(),
            advertise_host: None,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: default_api_address(),
            cors_enabled: false,
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: default_service_name(),
            port: default_discovery_port(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
        }
    }
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            sync_interval_ms: default_sync_interval_ms(),
            request_timeout_ms: None,
            peers: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl BeepConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &std::path::Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> crate::Result<Self> {
        let config: BeepConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> crate::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        // The id is a field of the '|'-separated discovery datagram
        if self.node.id.is_empty() || self.node.id.contains('|') {
            return Err(crate::Error::Config(
                "node.id must be non-empty and must not contain '|'".into(),
            ));
        }

        if self.discovery.service_name.is_empty() || self.discovery.service_name.contains('|') {
            return Err(crate::Error::Config(
                "discovery.service_name must be non-empty and must not contain '|'".into(),
            ));
        }

        if self.discovery.broadcast_interval_ms == 0 {
            return Err(crate::Error::Config("discovery.broadcast_interval_ms must be > 0".into()));
        }

        if self.replication.sync_interval_ms == 0 {
            return Err(crate::Error::Config("replication.sync_interval_ms must be > 0".into()));
        }

        self.seed_peers()?;

        Ok(())
    }

    /// Parse the configured seed peers into (host, port) pairs
    pub fn seed_peers(&self) -> crate::Result<Vec<(String, u16)>> {
        self.replication
            .peers
            .iter()
            .map(|peer| parse_peer_address(peer))
            .collect()
    }

    /// Get the sweep interval as Duration
    pub fn sync_interval(&self) -> Duration {
        Duration::from_millis(self.replication.sync_interval_ms)
    }

    /// Get the peer request timeout as Duration
    pub fn request_timeout(&self) -> Option<Duration> {
        self.replication.request_timeout_ms.map(Duration::from_millis)
    }

    /// Get the discovery broadcast interval as Duration
    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.discovery.broadcast_interval_ms)
    }
}

/// Split a `host:port` peer address
fn parse_peer_address(address: &str) -> crate::Result<(String, u16)> {
    if let Ok(addr) = address.parse::<SocketAddr>() {
        return Ok((addr.ip().to_string(), addr.port()));
    }

    let (host, port) = address
        .rsplit_once(':')
        .ok_or_else(|| crate::Error::Config(format!("peer address {} has no port", address)))?;
    let port: u16 = port
        .parse()
        .map_err(|_| crate::Error::Config(format!("peer address {} has an invalid port", address)))?;

    if host.is_empty() {
        return Err(crate::Error::Config(format!("peer address {} has no host", address)));
    }

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let toml = r#"
[node]
id = "node-1"

[api]
bind_address = "127.0.0.1:0"

[discovery]
service_name = "beep-beep"
port = 7700

[replication]
sync_interval_ms = 250
peers = ["10.0.0.2:8080", "peer-b:8081"]
"#;

        let config = BeepConfig::from_str(toml).unwrap();
        assert_eq!(config.node.id, "node-1");
        assert_eq!(config.discovery.port, 7700);
        assert_eq!(config.sync_interval(), Duration::from_millis(250));
        assert_eq!(
            config.seed_peers().unwrap(),
            vec![("10.0.0.2".to_string(), 8080), ("peer-b".to_string(), 8081)]
        );
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = BeepConfig::from_str("").unwrap();
        assert!(!config.node.id.is_empty());
        assert_eq!(config.discovery.service_name, DEFAULT_SERVICE_NAME);
        assert_eq!(config.replication.sync_interval_ms, 500);
        assert!(config.request_timeout().is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_config() {
        assert!(BeepConfig::from_str("[replication]\nsync_interval_ms = 0\n").is_err());
        assert!(BeepConfig::from_str("[replication]\npeers = [\"nohost\"]\n").is_err());
        assert!(BeepConfig::from_str("[discovery]\nservice_name = \"a|b\"\n").is_err());
        assert!(BeepConfig::from_str("[node]\nid = \"rack|1\"\n").is_err());
        assert!(BeepConfig::from_str("[node]\nid = \"\"\n").is_err());
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let mut config = BeepConfig::default();
        config.replication.peers.push("127.0.0.1:9000".to_string());
        let rendered = config.to_toml().unwrap();
        let parsed = BeepConfig::from_str(&rendered).unwrap();
        assert_eq!(parsed.node.id, config.node.id);
        assert_eq!(parsed.replication.peers, config.replication.peers);
    }
}
