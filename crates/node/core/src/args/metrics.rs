//! Metrics CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Metrics endpoint configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Metrics")]
#[serde(default)]
pub struct MetricsArgs {
    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9464).
    #[arg(long = "metrics", value_name = "ADDR")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub addr: Option<SocketAddr>,
}
