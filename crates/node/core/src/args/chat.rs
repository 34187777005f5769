//! Chat CLI arguments.

use clap::Args;
use serde::{Deserialize, Serialize};

/// Rendezvous and stream protocol configuration.
#[derive(Debug, Args, Clone, Default, Serialize, Deserialize)]
#[command(next_help_heading = "Chat")]
#[serde(default)]
pub struct ChatArgs {
    /// Rendezvous tag shared with the peers you want to meet.
    #[arg(long, value_name = "TAG")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rendezvous: Option<String>,

    /// Chat stream protocol id.
    #[arg(long, value_name = "PROTOCOL")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
}
