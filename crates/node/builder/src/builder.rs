//! Node builder type-state pattern.
//!
//! ```text
//! NodeBuilder
//!   │
//!   ├── with_launch_context(executor)
//!   ▼
//! WithLaunchContext
//!   │
//!   ├── with_node(config, identity)
//!   ▼
//! WithNode
//!   │
//!   ├── launch() / launch_with_console(input, output)
//!   ▼
//! NodeHandle
//! ```

use crate::NodeHandle;
use eyre::{Result, WrapErr, eyre};
use libp2p::StreamProtocol;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncWrite};
use tracing::info;
use tryst_console::ConsoleBridge;
use tryst_identity::NodeIdentity;
use tryst_net_discovery::{DiscoveryLoop, LoopConfig, Transport};
use tryst_net_p2p::{NetworkService, P2pConfig};
use tryst_net_session::{InboundAcceptor, SessionRegistry};
use tryst_node_core::{
    config::NodeConfig,
    constants::{DEFAULT_LISTEN_TIMEOUT_SECS, DEFAULT_PING_INTERVAL_SECS, PROTOCOL_VERSION},
    version::P2P_CLIENT_VERSION,
};
use tryst_tasks::TaskExecutor;

/// Context for launching a node.
#[derive(Clone)]
pub struct LaunchContext {
    /// Task executor for spawning background tasks.
    pub executor: TaskExecutor,
}

impl LaunchContext {
    pub fn new(executor: TaskExecutor) -> Self {
        Self { executor }
    }
}

/// Node builder - first stage.
pub struct NodeBuilder;

impl NodeBuilder {
    /// Create a new node builder.
    pub fn new() -> Self {
        Self
    }

    /// Add the launch context.
    pub fn with_launch_context(self, executor: TaskExecutor) -> WithLaunchContext {
        WithLaunchContext {
            ctx: LaunchContext::new(executor),
        }
    }
}

impl Default for NodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder with launch context attached.
pub struct WithLaunchContext {
    ctx: LaunchContext,
}

impl WithLaunchContext {
    /// Provide the node configuration and identity.
    pub fn with_node(self, config: NodeConfig, identity: NodeIdentity) -> WithNode {
        WithNode {
            ctx: self.ctx,
            config,
            identity,
        }
    }
}

/// Builder with everything needed to launch.
pub struct WithNode {
    ctx: LaunchContext,
    config: NodeConfig,
    identity: NodeIdentity,
}

impl WithNode {
    /// Launch the node with the process's stdin and stdout as console.
    pub async fn launch(self) -> Result<NodeHandle> {
        let input = tryst_console::stdin().wrap_err("failed to start console input")?;
        self.launch_with_console(input, tokio::io::stdout()).await
    }

    /// Launch the node with the given console input and output.
    ///
    /// Starts the network and waits for it to listen, then spawns the inbound
    /// acceptor, the discovery loop and the console bridge. Network setup errors
    /// are returned; nothing is left running in that case.
    pub async fn launch_with_console<R, W>(self, input: R, output: W) -> Result<NodeHandle>
    where
        R: AsyncBufRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let Self {
            ctx,
            config,
            identity,
        } = self;
        let executor = ctx.executor;
        let shutdown = executor.on_shutdown_signal().clone();

        identity.log();
        let protocol = parse_protocol(&config.chat.protocol).wrap_err("invalid chat protocol")?;
        let p2p = p2p_config(&config)?;

        let (mut service, network) = NetworkService::new(p2p, identity.keypair().clone())?;
        service.start().await?;
        info!(
            peer_id = %network.local_peer_id(),
            addresses = ?network.local_addresses(),
            "Host created"
        );
        executor.spawn_critical("network", service.run(shutdown.clone()));

        let (sessions, events) = SessionRegistry::new(executor.clone());

        executor.spawn(
            "peer-departures",
            sessions
                .clone()
                .close_departed(network.disconnections(), shutdown.clone()),
        );

        let acceptor = InboundAcceptor::new(&network, protocol.clone(), sessions.clone())?;
        executor.spawn_critical("inbound-acceptor", acceptor.run(shutdown.clone()));

        info!(rendezvous = %config.chat.rendezvous, %protocol, "Starting discovery");
        let discovery = DiscoveryLoop::new(
            network.clone(),
            network.clone(),
            sessions.clone(),
            LoopConfig {
                rendezvous: config.chat.rendezvous.clone(),
                protocol,
                interval: config.discovery.interval(),
                initial_delay: config.discovery.initial_delay(),
                address_check: config.discovery.address_check,
            },
        );
        executor.spawn_critical("discovery", discovery.run(shutdown.clone()));

        // Console input ending is not a reason to stop the node.
        let console = ConsoleBridge::new(input, output, sessions.clone(), events);
        executor.spawn("console", console.run(shutdown.clone()));

        let drain = sessions.clone();
        let on_shutdown = shutdown.clone();
        executor.spawn("session-drain", async move {
            on_shutdown.await;
            drain.join_all().await;
        });

        Ok(NodeHandle::new(network, sessions))
    }
}

fn parse_protocol(protocol: &str) -> Result<StreamProtocol> {
    StreamProtocol::try_from_owned(protocol.to_string())
        .map_err(|err| eyre!("`{protocol}` is not a protocol id: {err}"))
}

/// Maps the node configuration onto the swarm settings.
fn p2p_config(config: &NodeConfig) -> Result<P2pConfig> {
    Ok(P2pConfig {
        listen_addrs: config.network.listen_addrs()?,
        bootnodes: config.network.bootnode_addrs()?,
        kad_protocol: parse_protocol(&config.network.kad_protocol)
            .wrap_err("invalid Kademlia protocol")?,
        idle_timeout: config.network.idle_timeout(),
        listen_timeout: Duration::from_secs(DEFAULT_LISTEN_TIMEOUT_SECS),
        ping_interval: Duration::from_secs(DEFAULT_PING_INTERVAL_SECS),
        readvertise_interval: config.discovery.readvertise_interval(),
        protocol_version: PROTOCOL_VERSION.to_string(),
        agent_version: P2P_CLIENT_VERSION.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn p2p_config_follows_node_config() {
        let mut config = NodeConfig::default();
        config.network.default_bootnodes = false;
        config.network.listen = vec!["/ip4/127.0.0.1/tcp/4001".to_string()];
        config.discovery.readvertise_interval_secs = 42;

        let p2p = p2p_config(&config).unwrap();
        assert_eq!(p2p.listen_addrs[0].to_string(), "/ip4/127.0.0.1/tcp/4001");
        assert!(p2p.bootnodes.is_empty());
        assert_eq!(p2p.kad_protocol.as_ref(), "/ipfs/kad/1.0.0");
        assert_eq!(p2p.readvertise_interval, Duration::from_secs(42));
        assert_eq!(p2p.agent_version, P2P_CLIENT_VERSION);
    }

    #[test]
    fn default_bootnodes_are_used_when_none_given() {
        let p2p = p2p_config(&NodeConfig::default()).unwrap();
        assert!(!p2p.bootnodes.is_empty());
    }

    #[test]
    fn protocol_ids_must_start_with_slash() {
        assert!(parse_protocol("/chat/1.1.0").is_ok());
        assert!(parse_protocol("chat").is_err());
    }
}
