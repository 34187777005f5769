use libp2p::{Multiaddr, PeerId, kad::RecordKey};
use tokio::sync::{mpsc, oneshot};
use tryst_net_discovery::{DiscoveryError, PeerRecord};

/// Requests from a [`NetworkHandle`](crate::NetworkHandle) to the swarm task.
#[derive(Debug)]
pub(crate) enum Command {
    /// Publish a provider record, unless it was published recently.
    Provide {
        key: RecordKey,
        reply: oneshot::Sender<Result<(), DiscoveryError>>,
    },

    /// Stream the providers of a record. The sender is dropped when the query ends.
    FindProviders {
        key: RecordKey,
        records: mpsc::UnboundedSender<PeerRecord>,
    },

    /// Make sure a connection to the peer exists.
    Connect {
        peer: PeerId,
        reply: oneshot::Sender<Result<(), String>>,
    },

    /// Remember addresses of a peer, including in the routing table.
    AddAddresses { peer: PeerId, addrs: Vec<Multiaddr> },
}
