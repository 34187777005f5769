use crate::{
    command::Command,
    stream::{LiveStreams, TrackedStream},
};
use async_trait::async_trait;
use futures::{StreamExt, stream::BoxStream};
use libp2p::{Multiaddr, PeerId, StreamProtocol, kad::RecordKey};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::debug;
use tryst_net_discovery::{
    ConnectionState, ConnectionTable, DiscoveryError, DiscoveryService, PeerRecord, Transport,
    TransportError,
};

/// DHT record key under which peers sharing `tag` are found.
pub fn rendezvous_key(tag: &str) -> RecordKey {
    RecordKey::new(&format!("/tryst/rendezvous/{tag}"))
}

/// Cloneable access to a running [`NetworkService`](crate::NetworkService).
#[derive(Clone)]
pub struct NetworkHandle {
    local_peer_id: PeerId,
    local_addresses: Arc<RwLock<Vec<Multiaddr>>>,
    live: LiveStreams,
    control: libp2p_stream::Control,
    commands: mpsc::Sender<Command>,
}

impl std::fmt::Debug for NetworkHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkHandle")
            .field("local_peer_id", &self.local_peer_id)
            .finish_non_exhaustive()
    }
}

impl NetworkHandle {
    pub(crate) fn new(
        local_peer_id: PeerId,
        local_addresses: Arc<RwLock<Vec<Multiaddr>>>,
        live: LiveStreams,
        control: libp2p_stream::Control,
        commands: mpsc::Sender<Command>,
    ) -> Self {
        Self {
            local_peer_id,
            local_addresses,
            live,
            control,
            commands,
        }
    }

    /// Tells the node where `peer` can be reached.
    ///
    /// The peer is also added to the Kademlia routing table.
    pub async fn add_peer_addresses(
        &self,
        peer: PeerId,
        addrs: Vec<Multiaddr>,
    ) -> Result<(), TransportError> {
        self.commands
            .send(Command::AddAddresses { peer, addrs })
            .await
            .map_err(|_| TransportError::Closed)
    }

    /// Peers whose chat streams lost their underlying connection.
    ///
    /// Only disconnections after the call are reported.
    pub fn disconnections(&self) -> BoxStream<'static, PeerId> {
        UnboundedReceiverStream::new(self.live.watch()).boxed()
    }

    async fn connect(&self, peer: PeerId) -> Result<(), TransportError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Connect { peer, reply })
            .await
            .map_err(|_| TransportError::Closed)?;
        rx.await
            .map_err(|_| TransportError::Closed)?
            .map_err(|reason| TransportError::OpenStream { peer, reason })
    }
}

impl ConnectionTable for NetworkHandle {
    fn connection_state(&self, peer: &PeerId) -> ConnectionState {
        self.live.state(peer)
    }
}

#[async_trait]
impl Transport for NetworkHandle {
    type Stream = TrackedStream;

    fn local_peer_id(&self) -> PeerId {
        self.local_peer_id
    }

    fn local_addresses(&self) -> Vec<Multiaddr> {
        self.local_addresses.read().clone()
    }

    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<TrackedStream, TransportError> {
        self.connect(peer).await?;

        debug!(%peer, %protocol, "Opening stream");
        let stream = self
            .control
            .clone()
            .open_stream(peer, protocol)
            .await
            .map_err(|err| TransportError::OpenStream {
                peer,
                reason: err.to_string(),
            })?;

        Ok(TrackedStream::new(stream, self.live.track(peer)))
    }

    fn incoming(
        &self,
        protocol: StreamProtocol,
    ) -> Result<BoxStream<'static, (PeerId, TrackedStream)>, TransportError> {
        let incoming = self
            .control
            .clone()
            .accept(protocol.clone())
            .map_err(|_| TransportError::AlreadyRegistered(protocol))?;

        let live = self.live.clone();
        Ok(incoming
            .map(move |(peer, stream)| (peer, TrackedStream::new(stream, live.track(peer))))
            .boxed())
    }
}

#[async_trait]
impl DiscoveryService for NetworkHandle {
    async fn advertise(&self, tag: &str) -> Result<(), DiscoveryError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Provide {
                key: rendezvous_key(tag),
                reply,
            })
            .await
            .map_err(|_| DiscoveryError::Closed)?;
        rx.await.map_err(|_| DiscoveryError::Closed)?
    }

    async fn find_peers(&self, tag: &str) -> Result<BoxStream<'static, PeerRecord>, DiscoveryError> {
        let (records, rx) = mpsc::unbounded_channel();
        self.commands
            .send(Command::FindProviders {
                key: rendezvous_key(tag),
                records,
            })
            .await
            .map_err(|_| DiscoveryError::Closed)?;
        Ok(UnboundedReceiverStream::new(rx).boxed())
    }
}
