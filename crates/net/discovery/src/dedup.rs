//! Connection deduplication.
//!
//! Decides, for one discovered record, whether an outbound stream should be opened.
//! Nothing is cached between iterations: every iteration builds a fresh
//! [`IterationFilter`] so a peer that disconnected becomes eligible again.

use crate::{ConnectionTable, PeerRecord, address::intersects};
use libp2p::{Multiaddr, PeerId};
use std::collections::HashSet;

/// Why a discovered peer was not connected to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum SkipReason {
    /// The record is this node.
    SelfId,
    /// The record carries no address.
    NoAddresses,
    /// The record shares an address with this node, so it is likely this node under
    /// another identity.
    AddressCollision,
    /// A chat stream with the peer is already open.
    AlreadyConnected,
    /// The peer was already tried in this iteration.
    AlreadyAttempted,
}

/// Outcome of [`should_connect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Connect,
    Skip(SkipReason),
}

impl Decision {
    pub fn is_connect(&self) -> bool {
        matches!(self, Decision::Connect)
    }
}

/// Identity and addresses of the local node, as seen by the deduplicator.
#[derive(Debug, Clone)]
pub struct LocalNode {
    pub id: PeerId,
    pub addresses: Vec<Multiaddr>,
}

impl LocalNode {
    pub fn new(id: PeerId, addresses: Vec<Multiaddr>) -> Self {
        Self { id, addresses }
    }
}

/// Evaluates the stateless checks, in order: self id, empty address set, address
/// collision (if `address_check` is set), live connection.
pub fn should_connect<C>(
    candidate: &PeerRecord,
    local: &LocalNode,
    connections: &C,
    address_check: bool,
) -> Decision
where
    C: ConnectionTable + ?Sized,
{
    if candidate.id == local.id {
        return Decision::Skip(SkipReason::SelfId);
    }
    if candidate.addresses.is_empty() {
        return Decision::Skip(SkipReason::NoAddresses);
    }
    if address_check && intersects(&candidate.addresses, &local.addresses) {
        return Decision::Skip(SkipReason::AddressCollision);
    }
    if connections.connection_state(&candidate.id).is_connected() {
        return Decision::Skip(SkipReason::AlreadyConnected);
    }
    Decision::Connect
}

/// Per-iteration deduplicator: [`should_connect`] plus at most one attempt per peer.
#[derive(Debug)]
pub struct IterationFilter<'a> {
    local: &'a LocalNode,
    address_check: bool,
    attempted: HashSet<PeerId>,
}

impl<'a> IterationFilter<'a> {
    pub fn new(local: &'a LocalNode, address_check: bool) -> Self {
        Self {
            local,
            address_check,
            attempted: HashSet::new(),
        }
    }

    /// Decides for `candidate`, recording an attempt when the answer is connect.
    pub fn evaluate<C>(&mut self, candidate: &PeerRecord, connections: &C) -> Decision
    where
        C: ConnectionTable + ?Sized,
    {
        match should_connect(candidate, self.local, connections, self.address_check) {
            Decision::Connect if !self.attempted.insert(candidate.id) => {
                Decision::Skip(SkipReason::AlreadyAttempted)
            }
            decision => decision,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ConnectionState;
    use libp2p::{identity::Keypair, multiaddr::Protocol};
    use proptest::{collection::vec, prelude::*};
    use std::net::Ipv4Addr;

    #[derive(Default)]
    struct Table(HashSet<PeerId>);

    impl ConnectionTable for Table {
        fn connection_state(&self, peer: &PeerId) -> ConnectionState {
            if self.0.contains(peer) {
                ConnectionState::Connected
            } else {
                ConnectionState::Disconnected
            }
        }
    }

    fn peer(seed: u8) -> PeerId {
        let mut bytes = [0u8; 32];
        bytes[0] = seed;
        bytes[31] = 1;
        Keypair::ed25519_from_bytes(bytes)
            .unwrap()
            .public()
            .to_peer_id()
    }

    fn tcp(ip: [u8; 4], port: u16) -> Multiaddr {
        Multiaddr::empty()
            .with(Protocol::Ip4(Ipv4Addr::from(ip)))
            .with(Protocol::Tcp(port))
    }

    fn arb_addr() -> impl Strategy<Value = Multiaddr> {
        (any::<[u8; 4]>(), any::<u16>()).prop_map(|(ip, port)| tcp(ip, port))
    }

    fn arb_peer() -> impl Strategy<Value = PeerId> {
        any::<u8>().prop_map(peer)
    }

    fn local() -> LocalNode {
        LocalNode::new(peer(0), vec![tcp([10, 0, 0, 1], 4001)])
    }

    #[test]
    fn connects_to_fresh_peer() {
        let record = PeerRecord::new(peer(1), [tcp([10, 0, 0, 2], 4001)]);
        assert_eq!(
            should_connect(&record, &local(), &Table::default(), true),
            Decision::Connect
        );
    }

    #[test]
    fn checks_run_in_order() {
        let local = local();
        let mut table = Table::default();
        table.0.insert(local.id);

        // Self id wins over every other reason.
        let me = PeerRecord::new(local.id, local.addresses.clone());
        assert_eq!(
            should_connect(&me, &local, &table, true),
            Decision::Skip(SkipReason::SelfId)
        );

        // Empty addresses win over a live connection.
        let other = peer(2);
        table.0.insert(other);
        let empty = PeerRecord::new(other, []);
        assert_eq!(
            should_connect(&empty, &local, &table, true),
            Decision::Skip(SkipReason::NoAddresses)
        );

        // Collision wins over a live connection.
        let alias = PeerRecord::new(other, local.addresses.clone());
        assert_eq!(
            should_connect(&alias, &local, &table, true),
            Decision::Skip(SkipReason::AddressCollision)
        );
        assert_eq!(
            should_connect(&alias, &local, &table, false),
            Decision::Skip(SkipReason::AlreadyConnected)
        );
    }

    #[test]
    fn address_check_can_be_disabled() {
        let local = local();
        let alias = PeerRecord::new(peer(3), local.addresses.clone());
        assert_eq!(
            should_connect(&alias, &local, &Table::default(), false),
            Decision::Connect
        );
    }

    #[test]
    fn duplicate_records_attempted_once() {
        let local = local();
        let table = Table::default();
        let record = PeerRecord::new(peer(4), [tcp([10, 0, 0, 4], 1)]);
        let again = PeerRecord::new(peer(4), [tcp([10, 0, 0, 5], 1)]);

        let mut filter = IterationFilter::new(&local, true);
        assert!(filter.evaluate(&record, &table).is_connect());
        assert_eq!(
            filter.evaluate(&again, &table),
            Decision::Skip(SkipReason::AlreadyAttempted)
        );

        // A new iteration starts from scratch.
        let mut next = IterationFilter::new(&local, true);
        assert!(next.evaluate(&record, &table).is_connect());
    }

    #[test]
    fn skipped_records_are_not_counted_as_attempts() {
        let local = local();
        let mut table = Table::default();
        let id = peer(5);
        let record = PeerRecord::new(id, [tcp([10, 0, 0, 5], 1)]);
        table.0.insert(id);

        let mut filter = IterationFilter::new(&local, true);
        assert_eq!(
            filter.evaluate(&record, &table),
            Decision::Skip(SkipReason::AlreadyConnected)
        );

        table.0.remove(&id);
        assert!(filter.evaluate(&record, &table).is_connect());
    }

    #[test]
    fn reason_labels() {
        assert_eq!(SkipReason::SelfId.to_string(), "self_id");
        let label: &'static str = SkipReason::AddressCollision.into();
        assert_eq!(label, "address_collision");
    }

    proptest! {
        #[test]
        fn never_connects_to_self(addrs in vec(arb_addr(), 0..4), check in any::<bool>()) {
            let local = local();
            let record = PeerRecord::new(local.id, addrs);
            prop_assert_eq!(
                should_connect(&record, &local, &Table::default(), check),
                Decision::Skip(SkipReason::SelfId)
            );
        }

        #[test]
        fn never_connects_to_colliding_addresses(
            id in arb_peer(),
            mut addrs in vec(arb_addr(), 0..4),
            pick in any::<prop::sample::Index>(),
        ) {
            let local = local();
            prop_assume!(id != local.id);
            addrs.push(local.addresses[pick.index(local.addresses.len())].clone());
            let record = PeerRecord::new(id, addrs);
            prop_assert!(!should_connect(&record, &local, &Table::default(), true).is_connect());
        }

        #[test]
        fn never_connects_when_connected(
            id in arb_peer(),
            addrs in vec(arb_addr(), 0..4),
            check in any::<bool>(),
        ) {
            let local = local();
            let mut table = Table::default();
            table.0.insert(id);
            let record = PeerRecord::new(id, addrs);
            prop_assert!(!should_connect(&record, &local, &table, check).is_connect());
        }

        #[test]
        fn never_connects_without_addresses(id in arb_peer(), check in any::<bool>()) {
            let record = PeerRecord::new(id, []);
            prop_assert!(!should_connect(&record, &local(), &Table::default(), check).is_connect());
        }

        #[test]
        fn disconnected_peer_becomes_eligible_again(id in arb_peer(), addr in arb_addr()) {
            let local = local();
            prop_assume!(id != local.id);
            prop_assume!(!local.addresses.contains(&addr));
            let record = PeerRecord::new(id, [addr]);

            let mut table = Table::default();
            table.0.insert(id);
            let mut filter = IterationFilter::new(&local, true);
            prop_assert!(!filter.evaluate(&record, &table).is_connect());

            table.0.remove(&id);
            let mut next = IterationFilter::new(&local, true);
            prop_assert!(next.evaluate(&record, &table).is_connect());
        }
    }
}
