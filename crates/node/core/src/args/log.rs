//! Logging CLI arguments.

use clap::Args;
use std::path::PathBuf;

/// Logging configuration.
///
/// Logs are written to stderr; stdout belongs to the chat console.
#[derive(Debug, Args, Clone, Default)]
#[command(next_help_heading = "Logging")]
pub struct LogArgs {
    /// Silence all log output except errors.
    #[arg(short, long)]
    pub quiet: bool,

    /// Verbose mode (-v, -vv, -vvv, etc.).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Log filter directive (e.g., "tryst=debug,libp2p_kad=info").
    #[arg(long = "log.filter", value_name = "DIRECTIVE")]
    pub filter: Option<String>,

    /// Use JSON format for log output.
    #[arg(long = "log.json")]
    pub json: bool,

    /// Also write logs to this file.
    #[arg(long = "log.file", value_name = "PATH")]
    pub file: Option<PathBuf>,
}
