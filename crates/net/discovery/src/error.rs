use libp2p::{PeerId, StreamProtocol};

/// Errors from the [`Transport`](crate::Transport).
///
/// All of them are transient from the discovery loop's point of view.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A stream to the peer could not be opened.
    #[error("failed to open stream to {peer}: {reason}")]
    OpenStream { peer: PeerId, reason: String },

    /// Inbound streams for this protocol are already being consumed.
    #[error("protocol {0} is already registered")]
    AlreadyRegistered(StreamProtocol),

    /// The transport has shut down.
    #[error("transport closed")]
    Closed,
}

/// Errors from the [`DiscoveryService`](crate::DiscoveryService).
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// Publishing the rendezvous record failed.
    #[error("advertise failed: {0}")]
    Advertise(String),

    /// Looking up the rendezvous record failed.
    #[error("query failed: {0}")]
    Query(String),

    /// The discovery service has shut down.
    #[error("discovery service closed")]
    Closed,
}
