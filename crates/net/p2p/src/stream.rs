//! Chat streams and the live connection table they keep up to date.

use crate::metrics::LIVE_STREAMS_GAUGE;
use futures::{AsyncRead, AsyncWrite};
use libp2p::PeerId;
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    io,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};
use tokio::sync::mpsc;
use tryst_net_discovery::ConnectionState;

#[derive(Debug, Default)]
struct PeerStreams {
    open: usize,
    /// The last swarm connection to the peer closed while streams were still open.
    stale: bool,
}

#[derive(Debug, Default)]
struct Table {
    peers: HashMap<PeerId, PeerStreams>,
    watchers: Vec<mpsc::UnboundedSender<PeerId>>,
}

/// Open chat streams per peer.
///
/// A peer is connected while it has at least one open stream and the swarm
/// still holds a connection to it.
#[derive(Clone, Debug, Default)]
pub(crate) struct LiveStreams {
    table: Arc<Mutex<Table>>,
}

impl LiveStreams {
    /// Counts a new stream to `peer` until the returned guard is dropped.
    pub(crate) fn track(&self, peer: PeerId) -> LiveGuard {
        let mut table = self.table.lock();
        let entry = table.peers.entry(peer).or_default();
        entry.open += 1;
        // A new stream rides on a new connection.
        entry.stale = false;
        metrics::gauge!(LIVE_STREAMS_GAUGE).increment(1.0);
        LiveGuard {
            peer,
            table: self.table.clone(),
        }
    }

    pub(crate) fn state(&self, peer: &PeerId) -> ConnectionState {
        match self.table.lock().peers.get(peer) {
            Some(entry) if !entry.stale => ConnectionState::Connected,
            _ => ConnectionState::Disconnected,
        }
    }

    /// Records that the swarm holds no connection to `peer` any more.
    pub(crate) fn disconnected(&self, peer: PeerId) {
        let mut table = self.table.lock();
        let Some(entry) = table.peers.get_mut(&peer) else {
            return;
        };
        entry.stale = true;
        table.watchers.retain(|watcher| watcher.send(peer).is_ok());
    }

    /// Peers whose chat streams lost their connection.
    pub(crate) fn watch(&self) -> mpsc::UnboundedReceiver<PeerId> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.table.lock().watchers.push(tx);
        rx
    }
}

/// Keeps a peer in the [`LiveStreams`] table.
#[derive(Debug)]
pub(crate) struct LiveGuard {
    peer: PeerId,
    table: Arc<Mutex<Table>>,
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock();
        if let Some(entry) = table.peers.get_mut(&self.peer) {
            entry.open -= 1;
            if entry.open == 0 {
                table.peers.remove(&self.peer);
            }
        }
        metrics::gauge!(LIVE_STREAMS_GAUGE).decrement(1.0);
    }
}

/// A libp2p stream that counts as a live connection while it exists.
#[derive(Debug)]
pub struct TrackedStream {
    inner: libp2p::Stream,
    _guard: LiveGuard,
}

impl TrackedStream {
    pub(crate) fn new(inner: libp2p::Stream, guard: LiveGuard) -> Self {
        Self {
            inner,
            _guard: guard,
        }
    }
}

impl AsyncRead for TrackedStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_read(cx, buf)
    }
}

impl AsyncWrite for TrackedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().inner).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_close(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_close(cx)
    }
}
