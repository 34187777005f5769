use libp2p::Multiaddr;
use std::time::Duration;

/// Fatal errors while setting up the network.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// The swarm could not be assembled.
    #[error("failed to build swarm: {0}")]
    Build(String),

    /// A listen address was rejected.
    #[error("failed to listen on {addr}: {reason}")]
    Listen { addr: Multiaddr, reason: String },

    /// No listener came up in time.
    #[error("no listen address within {0:?}")]
    ListenTimeout(Duration),

    /// Bootnodes are dialed by peer id and need one.
    #[error("bootnode {0} has no /p2p/<peer id> suffix")]
    BootnodeWithoutPeerId(Multiaddr),
}
