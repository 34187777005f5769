//! In-memory [`Transport`] and [`DiscoveryService`] for tests.
//!
//! Nodes created from the same [`MemoryNetwork`] can advertise, find and open
//! streams to each other. Streams are `tokio::io::duplex` pipes.

use crate::{
    ConnectionState, ConnectionTable, DiscoveryError, DiscoveryService, PeerRecord, Transport,
    TransportError,
};
use async_trait::async_trait;
use futures::{
    StreamExt,
    channel::mpsc,
    stream::{self, BoxStream},
};
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use tokio::io::DuplexStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};

/// Buffer size of each in-memory pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

/// A stream between two in-memory nodes.
pub type MemoryStream = Compat<DuplexStream>;

type Listener = mpsc::UnboundedSender<(PeerId, MemoryStream)>;

#[derive(Default)]
struct NetworkState {
    listeners: HashMap<(PeerId, StreamProtocol), Listener>,
    providers: HashMap<String, Vec<PeerRecord>>,
    connections: HashMap<PeerId, HashSet<PeerId>>,
    unreachable: HashSet<PeerId>,
    failing_queries: bool,
    failing_adverts: bool,
}

impl NetworkState {
    fn connect(&mut self, a: PeerId, b: PeerId) {
        self.connections.entry(a).or_default().insert(b);
        self.connections.entry(b).or_default().insert(a);
    }
}

/// A shared in-memory network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node to the network.
    pub fn node(&self, id: PeerId, addresses: Vec<Multiaddr>) -> (MemoryTransport, MemoryDiscovery) {
        let transport = MemoryTransport {
            id,
            addresses: addresses.clone(),
            network: self.clone(),
        };
        let discovery = MemoryDiscovery {
            record: PeerRecord::new(id, addresses),
            network: self.clone(),
        };
        (transport, discovery)
    }

    /// Publishes an arbitrary record under `tag`.
    pub fn provide(&self, tag: &str, record: PeerRecord) {
        self.state
            .lock()
            .providers
            .entry(tag.to_string())
            .or_default()
            .push(record);
    }

    /// Makes stream opens towards `peer` fail (or succeed again).
    pub fn set_unreachable(&self, peer: PeerId, unreachable: bool) {
        let mut state = self.state.lock();
        if unreachable {
            state.unreachable.insert(peer);
        } else {
            state.unreachable.remove(&peer);
        }
    }

    /// Makes every peer query fail (or succeed again).
    pub fn set_failing_queries(&self, failing: bool) {
        self.state.lock().failing_queries = failing;
    }

    /// Makes every advertisement fail (or succeed again).
    pub fn set_failing_adverts(&self, failing: bool) {
        self.state.lock().failing_adverts = failing;
    }

    /// Forgets the connection between `a` and `b`.
    pub fn disconnect(&self, a: PeerId, b: PeerId) {
        let mut state = self.state.lock();
        if let Some(peers) = state.connections.get_mut(&a) {
            peers.remove(&b);
        }
        if let Some(peers) = state.connections.get_mut(&b) {
            peers.remove(&a);
        }
    }
}

/// Transport side of an in-memory node.
#[derive(Clone)]
pub struct MemoryTransport {
    id: PeerId,
    addresses: Vec<Multiaddr>,
    network: MemoryNetwork,
}

impl ConnectionTable for MemoryTransport {
    fn connection_state(&self, peer: &PeerId) -> ConnectionState {
        let state = self.network.state.lock();
        match state.connections.get(&self.id) {
            Some(peers) if peers.contains(peer) => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    type Stream = MemoryStream;

    fn local_peer_id(&self) -> PeerId {
        self.id
    }

    fn local_addresses(&self) -> Vec<Multiaddr> {
        self.addresses.clone()
    }

    async fn open_stream(
        &self,
        peer: PeerId,
        protocol: StreamProtocol,
    ) -> Result<Self::Stream, TransportError> {
        let mut state = self.network.state.lock();
        let fail = |reason: &str| TransportError::OpenStream {
            peer,
            reason: reason.to_string(),
        };

        if state.unreachable.contains(&peer) {
            return Err(fail("unreachable"));
        }
        let listener = state
            .listeners
            .get(&(peer, protocol))
            .ok_or_else(|| fail("protocol not supported"))?;

        let (local, remote) = tokio::io::duplex(PIPE_CAPACITY);
        listener
            .unbounded_send((self.id, remote.compat()))
            .map_err(|_| fail("listener closed"))?;
        state.connect(self.id, peer);
        Ok(local.compat())
    }

    fn incoming(
        &self,
        protocol: StreamProtocol,
    ) -> Result<BoxStream<'static, (PeerId, Self::Stream)>, TransportError> {
        let mut state = self.network.state.lock();
        let key = (self.id, protocol.clone());
        if state.listeners.get(&key).is_some_and(|l| !l.is_closed()) {
            return Err(TransportError::AlreadyRegistered(protocol));
        }
        let (tx, rx) = mpsc::unbounded();
        state.listeners.insert(key, tx);
        Ok(rx.boxed())
    }
}

/// Discovery side of an in-memory node.
#[derive(Clone)]
pub struct MemoryDiscovery {
    record: PeerRecord,
    network: MemoryNetwork,
}

#[async_trait]
impl DiscoveryService for MemoryDiscovery {
    async fn advertise(&self, tag: &str) -> Result<(), DiscoveryError> {
        let mut state = self.network.state.lock();
        if state.failing_adverts {
            return Err(DiscoveryError::Advertise("advertising disabled".to_string()));
        }
        let records = state.providers.entry(tag.to_string()).or_default();
        if !records.iter().any(|r| r.same_peer(&self.record)) {
            records.push(self.record.clone());
        }
        Ok(())
    }

    async fn find_peers(&self, tag: &str) -> Result<BoxStream<'static, PeerRecord>, DiscoveryError> {
        let state = self.network.state.lock();
        if state.failing_queries {
            return Err(DiscoveryError::Query("queries disabled".to_string()));
        }
        let records = state.providers.get(tag).cloned().unwrap_or_default();
        Ok(stream::iter(records).boxed())
    }
}
