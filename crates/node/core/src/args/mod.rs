//! CLI argument structs for node configuration.
//!
//! These args serve dual purposes:
//! - CLI parsing via clap (`#[derive(Args)]`)
//! - Configuration overrides via serde: unset fields are skipped when serialized, so
//!   they never shadow values from the config file or environment.

mod chat;
mod discovery;
mod identity;
mod log;
mod metrics;
mod network;

pub use chat::ChatArgs;
pub use discovery::DiscoveryArgs;
pub use identity::IdentityArgs;
pub use log::LogArgs;
pub use metrics::MetricsArgs;
pub use network::NetworkArgs;

use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Arguments for running a node.
///
/// Serializes to the same shape as [`NodeConfig`](crate::config::NodeConfig).
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeArgs {
    /// Path to a TOML config file.
    #[arg(long, value_name = "PATH")]
    #[serde(skip)]
    pub config: Option<PathBuf>,

    /// Identity configuration.
    #[command(flatten)]
    #[serde(skip)]
    pub identity: IdentityArgs,

    /// Network configuration.
    #[command(flatten)]
    pub network: NetworkArgs,

    /// Chat configuration.
    #[command(flatten)]
    pub chat: ChatArgs,

    /// Discovery configuration.
    #[command(flatten)]
    pub discovery: DiscoveryArgs,

    /// Metrics configuration.
    #[command(flatten)]
    pub metrics: MetricsArgs,
}
