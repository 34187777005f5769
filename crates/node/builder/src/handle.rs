//! Node handle for a running node.

use libp2p::PeerId;
use tryst_net_p2p::NetworkHandle;
use tryst_net_session::SessionRegistry;

/// Handle to a running node.
///
/// All services are already spawned on the `TaskManager`; the handle only
/// gives access to their shared state.
pub struct NodeHandle {
    /// Network access (transport and discovery).
    network: NetworkHandle,
    /// Open chat sessions.
    sessions: SessionRegistry,
}

impl NodeHandle {
    /// Create a new node handle.
    pub fn new(network: NetworkHandle, sessions: SessionRegistry) -> Self {
        Self { network, sessions }
    }

    pub fn network(&self) -> &NetworkHandle {
        &self.network
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn local_peer_id(&self) -> PeerId {
        tryst_net_discovery::Transport::local_peer_id(&self.network)
    }
}
