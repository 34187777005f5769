//! Discovery loop CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

/// Discovery loop configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Discovery")]
#[serde(default)]
pub struct DiscoveryArgs {
    /// Seconds to wait between discovery iterations.
    #[arg(long = "discovery.interval", value_name = "SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,

    /// Seconds to wait before the first iteration.
    #[arg(long = "discovery.initial-delay", value_name = "SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_delay_secs: Option<u64>,

    /// Skip discovered peers that share an address with this node.
    #[arg(long = "discovery.address-check", value_name = "BOOL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_check: Option<bool>,

    /// Minimum seconds between two provider publications of the rendezvous tag.
    #[arg(long = "discovery.readvertise-interval", value_name = "SECS")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readvertise_interval_secs: Option<u64>,
}
