use libp2p::{Multiaddr, PeerId};

/// A peer returned by a discovery query: its id and the addresses known for it.
///
/// Records are transient; every query produces fresh ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub id: PeerId,
    pub addresses: Vec<Multiaddr>,
}

impl PeerRecord {
    /// Creates a record, dropping duplicate addresses.
    pub fn new(id: PeerId, addresses: impl IntoIterator<Item = Multiaddr>) -> Self {
        let mut deduped: Vec<Multiaddr> = Vec::new();
        for addr in addresses {
            if !deduped.contains(&addr) {
                deduped.push(addr);
            }
        }
        Self {
            id,
            addresses: deduped,
        }
    }

    /// Whether this record refers to the same peer as `other`.
    pub fn same_peer(&self, other: &PeerRecord) -> bool {
        self.id == other.id
    }
}
