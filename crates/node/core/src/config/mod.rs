//! Figment-based configuration loading.
//!
//! Configuration priority (highest wins):
//! 1. CLI arguments
//! 2. Environment variables (`TRYST_` prefix, `__` separates sections,
//!    e.g. `TRYST_CHAT__RENDEZVOUS`)
//! 3. Config file (TOML)
//! 4. Defaults

mod network;

pub use network::NetworkConfig;

use crate::{args::NodeArgs, constants::*};
use eyre::{Result, WrapErr};
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::Path, time::Duration};

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Network configuration.
    pub network: NetworkConfig,

    /// Chat configuration.
    pub chat: ChatConfig,

    /// Discovery configuration.
    pub discovery: DiscoveryConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Load configuration from defaults, config file, environment and CLI arguments.
    ///
    /// A missing config file is not an error; the defaults are used instead.
    pub fn load(config_path: Option<&Path>, args: &NodeArgs) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(NodeConfig::default()));

        if let Some(path) = config_path {
            if path.exists() {
                figment = figment.merge(Toml::file(path));
            } else {
                tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            }
        }

        figment
            .merge(Env::prefixed("TRYST_").split("__"))
            .merge(Serialized::defaults(args))
            .extract()
            .wrap_err("Failed to load configuration")
    }
}

/// Rendezvous and protocol configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Rendezvous tag.
    pub rendezvous: String,

    /// Chat stream protocol id.
    pub protocol: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            rendezvous: DEFAULT_RENDEZVOUS.to_string(),
            protocol: DEFAULT_CHAT_PROTOCOL.to_string(),
        }
    }
}

/// Discovery loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Seconds between iterations.
    pub interval_secs: u64,

    /// Seconds before the first iteration.
    pub initial_delay_secs: u64,

    /// Skip peers sharing an address with the local node.
    pub address_check: bool,

    /// Minimum seconds between provider publications.
    pub readvertise_interval_secs: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_DISCOVERY_INTERVAL_SECS,
            initial_delay_secs: DEFAULT_DISCOVERY_INITIAL_DELAY_SECS,
            address_check: true,
            readvertise_interval_secs: DEFAULT_READVERTISE_INTERVAL_SECS,
        }
    }
}

impl DiscoveryConfig {
    /// Pause between iterations.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Pause before the first iteration.
    pub fn initial_delay(&self) -> Duration {
        Duration::from_secs(self.initial_delay_secs)
    }

    /// Minimum time between provider publications.
    pub fn readvertise_interval(&self) -> Duration {
        Duration::from_secs(self.readvertise_interval_secs)
    }
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Prometheus listen address. Disabled when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<SocketAddr>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.chat.rendezvous, "meet me here");
        assert_eq!(config.chat.protocol, "/chat/1.1.0");
        assert!(config.discovery.address_check);
        assert_eq!(config.network.listen, vec!["/ip4/0.0.0.0/tcp/0".to_string()]);
        assert!(config.metrics.addr.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[chat]
rendezvous = "meet-here"

[discovery]
interval_secs = 30
address_check = false
"#,
        )
        .unwrap();

        let config = NodeConfig::load(Some(&config_path), &NodeArgs::default()).unwrap();
        assert_eq!(config.chat.rendezvous, "meet-here");
        assert_eq!(config.chat.protocol, DEFAULT_CHAT_PROTOCOL);
        assert_eq!(config.discovery.interval(), Duration::from_secs(30));
        assert!(!config.discovery.address_check);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nonexistent.toml");

        let config = NodeConfig::load(Some(&config_path), &NodeArgs::default()).unwrap();
        assert_eq!(config.discovery, DiscoveryConfig::default());
        assert_eq!(config.chat, ChatConfig::default());
    }

    #[test]
    fn test_cli_overrides_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        fs::write(
            &config_path,
            r#"
[chat]
rendezvous = "from-file"
protocol = "/file/1.0.0"

[network]
listen = ["/ip4/127.0.0.1/tcp/4001"]
"#,
        )
        .unwrap();

        let mut args = NodeArgs::default();
        args.chat.rendezvous = Some("from-cli".to_string());
        args.discovery.address_check = Some(false);

        let config = NodeConfig::load(Some(&config_path), &args).unwrap();
        assert_eq!(config.chat.rendezvous, "from-cli");
        // Unset CLI fields leave the file value alone.
        assert_eq!(config.chat.protocol, "/file/1.0.0");
        assert_eq!(config.network.listen, vec!["/ip4/127.0.0.1/tcp/4001".to_string()]);
        assert!(!config.discovery.address_check);
    }

    #[test]
    fn test_cli_listen_replaces_default() {
        let mut args = NodeArgs::default();
        args.network.listen = vec!["/ip4/127.0.0.1/tcp/0".to_string()];

        let config = NodeConfig::load(None, &args).unwrap();
        let addrs = config.network.listen_addrs().unwrap();
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].to_string(), "/ip4/127.0.0.1/tcp/0");
    }

    #[test]
    fn test_bootnode_fallback() {
        let config = NetworkConfig::default();
        assert_eq!(config.bootnode_addrs().unwrap().len(), DEFAULT_BOOTNODES.len());

        let config = NetworkConfig {
            default_bootnodes: false,
            ..Default::default()
        };
        assert!(config.bootnode_addrs().unwrap().is_empty());

        let config = NetworkConfig {
            bootnodes: vec!["not a multiaddr".to_string()],
            ..Default::default()
        };
        assert!(config.bootnode_addrs().is_err());
    }
}
