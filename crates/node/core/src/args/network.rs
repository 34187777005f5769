//! P2P network CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

/// P2P network configuration.
///
/// Every field is optional: unset fields fall through to the config file,
/// environment and built-in defaults (see [`NodeConfig::load`](crate::config::NodeConfig::load)).
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Networking")]
#[serde(default)]
pub struct NetworkArgs {
    /// Multiaddr to listen on (repeatable).
    ///
    /// Example: `--listen /ip4/0.0.0.0/tcp/0`
    #[arg(long = "listen", value_name = "MULTIADDR")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub listen: Vec<String>,

    /// Bootstrap peer multiaddr, including `/p2p/<peer id>` (repeatable).
    #[arg(long = "bootnode", value_name = "MULTIADDR")]
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bootnodes: Vec<String>,

    /// Fall back to the public libp2p bootstrap nodes when no bootnode is given.
    #[arg(long = "network.default-bootnodes", value_name = "BOOL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_bootnodes: Option<bool>,

    /// Kademlia protocol name.
    #[arg(long = "network.kad-protocol", value_name = "PROTOCOL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kad_protocol: Option<String>,

    /// Connection idle timeout in seconds.
    #[arg(long = "network.idle-timeout", value_name = "SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_timeout_secs: Option<u64>,
}
