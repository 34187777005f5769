//! Identity CLI arguments.

use clap::Args;

/// Identity configuration.
///
/// The key never goes through the config file.
#[derive(Debug, Args, Clone, Default)]
#[command(next_help_heading = "Identity")]
pub struct IdentityArgs {
    /// Base64 encoded private key. A new Ed25519 key is generated and printed when absent.
    #[arg(long, env = "TRYST_KEY", value_name = "BASE64", hide_env_values = true)]
    pub key: Option<String>,

    /// Print a new private key and exit.
    #[arg(long = "print-key", conflicts_with = "key")]
    pub print_key: bool,
}
