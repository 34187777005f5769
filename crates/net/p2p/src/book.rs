//! Known addresses of remote peers.

use libp2p::{Multiaddr, PeerId, multiaddr::Protocol};
use std::collections::HashMap;

/// Addresses kept per peer; the oldest is dropped first.
const MAX_ADDRESSES_PER_PEER: usize = 16;

/// Splits `/.../p2p/<peer id>` into the peer id and the address before it.
pub fn split_peer_id(addr: &Multiaddr) -> Option<(PeerId, Multiaddr)> {
    let mut base = addr.clone();
    match base.pop() {
        Some(Protocol::P2p(peer)) => Some((peer, base)),
        _ => None,
    }
}

/// Drops a trailing `/p2p/<peer id>`, if any.
pub fn strip_peer_id(addr: Multiaddr) -> Multiaddr {
    match split_peer_id(&addr) {
        Some((_, base)) => base,
        None => addr,
    }
}

/// Peers kept in the book; the least recently updated one is dropped first.
const MAX_PEERS: usize = 1024;

#[derive(Debug)]
struct Entry {
    addrs: Vec<Multiaddr>,
    updated: u64,
}

/// Address book fed by identify, Kademlia and observed connections.
#[derive(Debug)]
pub(crate) struct AddressBook {
    peers: HashMap<PeerId, Entry>,
    max_peers: usize,
    clock: u64,
}

impl Default for AddressBook {
    fn default() -> Self {
        Self::with_max_peers(MAX_PEERS)
    }
}

impl AddressBook {
    pub(crate) fn with_max_peers(max_peers: usize) -> Self {
        Self {
            peers: HashMap::new(),
            max_peers,
            clock: 0,
        }
    }

    pub(crate) fn insert(&mut self, peer: PeerId, addr: Multiaddr) {
        let addr = strip_peer_id(addr);
        if addr.is_empty() {
            return;
        }
        if !self.peers.contains_key(&peer) && self.peers.len() >= self.max_peers {
            self.evict_stalest();
        }

        self.clock += 1;
        let entry = self.peers.entry(peer).or_insert(Entry {
            addrs: Vec::new(),
            updated: 0,
        });
        entry.updated = self.clock;
        if entry.addrs.contains(&addr) {
            return;
        }
        if entry.addrs.len() == MAX_ADDRESSES_PER_PEER {
            entry.addrs.remove(0);
        }
        entry.addrs.push(addr);
    }

    pub(crate) fn extend(&mut self, peer: PeerId, addrs: impl IntoIterator<Item = Multiaddr>) {
        for addr in addrs {
            self.insert(peer, addr);
        }
    }

    pub(crate) fn get(&self, peer: &PeerId) -> Vec<Multiaddr> {
        self.peers
            .get(peer)
            .map(|entry| entry.addrs.clone())
            .unwrap_or_default()
    }

    pub(crate) fn remove(&mut self, peer: &PeerId) {
        self.peers.remove(peer);
    }

    pub(crate) fn len(&self) -> usize {
        self.peers.len()
    }

    fn evict_stalest(&mut self) {
        let stalest = self
            .peers
            .iter()
            .min_by_key(|(_, entry)| entry.updated)
            .map(|(peer, _)| *peer);
        if let Some(peer) = stalest {
            self.peers.remove(&peer);
        }
    }
}
