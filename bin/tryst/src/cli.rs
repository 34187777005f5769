//! Tryst CLI entry point.

use clap::Parser;
use eyre::{Result, bail};
use std::{io, time::Duration};
use tracing::{info, warn};
use tryst_node_builder::NodeBuilder;
use tryst_node_core::{
    args::{LogArgs, NodeArgs},
    config::NodeConfig,
    constants::DEFAULT_SHUTDOWN_TIMEOUT_SECS,
    logging::init_logging,
    metrics::install_metrics,
    version,
};
use tryst_tasks::TaskManager;

/// Tryst - meet peers under a shared rendezvous tag and chat with them
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Logging configuration.
    #[command(flatten)]
    pub(crate) logs: LogArgs,

    /// Node configuration.
    #[command(flatten)]
    pub(crate) node: NodeArgs,
}

/// Parse the command line and run the node until Ctrl-C.
pub(crate) async fn run() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();

    if cli.node.identity.print_key {
        println!("{}", tryst_identity::generate_encoded()?);
        return Ok(());
    }

    let _log_guard = init_logging(&cli.logs)?;
    info!("Starting Tryst {}", version::VERSION);

    let config = NodeConfig::load(cli.node.config.as_deref(), &cli.node)?;
    let identity = tryst_identity::obtain(cli.node.identity.key.as_deref(), &mut io::stdout().lock())?;
    install_metrics(&config.metrics)?;

    let mut manager = TaskManager::current();
    let node = NodeBuilder::new()
        .with_launch_context(manager.executor())
        .with_node(config, identity)
        .launch()
        .await?;
    info!(peer_id = %node.local_peer_id(), "Node running, press Ctrl-C to stop");

    let exit = manager.wait_for_exit().await;
    info!(%exit, "Shutting down");
    if !manager
        .graceful_shutdown(Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS))
        .await
    {
        warn!("Some tasks did not stop in time");
    }

    if exit.is_failure() {
        bail!("node stopped: {exit}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_options() {
        let cli = Cli::try_parse_from([
            "tryst",
            "--listen",
            "/ip4/127.0.0.1/tcp/4001",
            "--rendezvous",
            "meet-here",
            "--discovery.address-check",
            "false",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.logs.verbosity, 2);
        assert_eq!(cli.node.network.listen, vec!["/ip4/127.0.0.1/tcp/4001".to_string()]);
        assert_eq!(cli.node.chat.rendezvous.as_deref(), Some("meet-here"));
        assert_eq!(cli.node.discovery.address_check, Some(false));
    }

    #[test]
    fn print_key_conflicts_with_key() {
        assert!(Cli::try_parse_from(["tryst", "--print-key", "--key", "CAESQ"]).is_err());
        assert!(Cli::try_parse_from(["tryst", "--print-key"]).unwrap().node.identity.print_key);
    }
}
