//! Contracts of the collaborators the discovery loop drives.

use crate::{DiscoveryError, PeerRecord, TransportError};
use async_trait::async_trait;
use futures::{AsyncRead, AsyncWrite, stream::BoxStream};
use libp2p::{Multiaddr, PeerId, StreamProtocol};

/// Whether a chat stream with a peer is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Read access to the live connection table.
pub trait ConnectionTable {
    fn connection_state(&self, peer: &PeerId) -> ConnectionState;
}

/// Which side opened a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Direction {
    Inbound,
    Outbound,
}

/// Encrypted, authenticated, multiplexed streams to identified peers.
///
/// The connection table and the local address set are owned by the transport;
/// callers only read them.
#[async_trait]
pub trait Transport: ConnectionTable + Send + Sync + 'static {
    /// A duplex byte stream to one peer.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    fn local_peer_id(&self) -> PeerId;

    /// Addresses this node is reachable under.
    fn local_addresses(&self) -> Vec<Multiaddr>;

    /// Opens a new stream to `peer` for `protocol`, dialing it if needed.
    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, TransportError>;

    /// Streams opened by remote peers for `protocol`.
    ///
    /// Only one consumer per protocol is allowed.
    fn incoming(
        &self,
        protocol: StreamProtocol,
    ) -> Result<BoxStream<'static, (PeerId, Self::Stream)>, TransportError>;
}

/// Maps a rendezvous tag to the peers advertising it.
#[async_trait]
pub trait DiscoveryService: Send + Sync + 'static {
    /// Announces this node under `tag`. Repeating it is harmless.
    async fn advertise(&self, tag: &str) -> Result<(), DiscoveryError>;

    /// Finds peers advertising `tag`.
    ///
    /// The returned stream is finite; query again for fresh results.
    async fn find_peers(&self, tag: &str) -> Result<BoxStream<'static, PeerRecord>, DiscoveryError>;
}

/// Takes ownership of established streams.
pub trait StreamHandler<S>: Send + Sync + 'static {
    fn handle_stream(&self, peer: PeerId, direction: Direction, stream: S);
}
