//! Network configuration for TOML persistence.

use crate::constants::*;
use eyre::{Result, WrapErr};
use libp2p::Multiaddr;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Network configuration (TOML-serializable).
///
/// Addresses are kept as strings here and parsed into [`Multiaddr`]s on use, so a
/// malformed entry is reported with the offending value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Listen addresses.
    pub listen: Vec<String>,

    /// Bootstrap nodes (as string multiaddresses).
    pub bootnodes: Vec<String>,

    /// Use the public libp2p bootstrap nodes when `bootnodes` is empty.
    pub default_bootnodes: bool,

    /// Kademlia protocol name.
    pub kad_protocol: String,

    /// Connection idle timeout in seconds.
    pub idle_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: vec![DEFAULT_LISTEN_ADDR.to_string()],
            bootnodes: Vec::new(),
            default_bootnodes: true,
            kad_protocol: DEFAULT_KAD_PROTOCOL.to_string(),
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
        }
    }
}

impl NetworkConfig {
    /// Parsed listen addresses.
    pub fn listen_addrs(&self) -> Result<Vec<Multiaddr>> {
        parse_multiaddrs(&self.listen).wrap_err("invalid listen address")
    }

    /// Parsed bootnodes, falling back to the public bootstrap list when allowed.
    pub fn bootnode_addrs(&self) -> Result<Vec<Multiaddr>> {
        if self.bootnodes.is_empty() && self.default_bootnodes {
            let defaults: Vec<String> = DEFAULT_BOOTNODES.iter().map(|s| s.to_string()).collect();
            return parse_multiaddrs(&defaults).wrap_err("invalid default bootnode");
        }
        parse_multiaddrs(&self.bootnodes).wrap_err("invalid bootnode address")
    }

    /// Connection idle timeout.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }
}

fn parse_multiaddrs(addrs: &[String]) -> Result<Vec<Multiaddr>> {
    addrs
        .iter()
        .map(|addr| {
            addr.parse::<Multiaddr>()
                .wrap_err_with(|| format!("`{addr}` is not a multiaddr"))
        })
        .collect()
}
