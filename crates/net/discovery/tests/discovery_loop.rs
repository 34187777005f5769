use futures::StreamExt;
use libp2p::{Multiaddr, PeerId, StreamProtocol};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tryst_net_discovery::{
    ConnectionState, ConnectionTable, Direction, DiscoveryLoop, LoopConfig, PeerRecord,
    SkipReason, StreamHandler, Transport,
    test_utils::{MemoryDiscovery, MemoryNetwork, MemoryStream, MemoryTransport},
};
use tryst_tasks::signal;

const TAG: &str = "meet-here";

fn protocol() -> StreamProtocol {
    StreamProtocol::new("/chat/1.1.0")
}

fn addr(s: &str) -> Multiaddr {
    s.parse().unwrap()
}

fn config() -> LoopConfig {
    LoopConfig {
        rendezvous: TAG.to_string(),
        protocol: protocol(),
        interval: Duration::from_secs(5),
        initial_delay: Duration::from_secs(1),
        address_check: true,
    }
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<(PeerId, Direction)>>>);

impl Recorder {
    fn peers(&self) -> Vec<(PeerId, Direction)> {
        self.0.lock().unwrap().clone()
    }
}

impl StreamHandler<MemoryStream> for Recorder {
    fn handle_stream(&self, peer: PeerId, direction: Direction, _stream: MemoryStream) {
        self.0.lock().unwrap().push((peer, direction));
    }
}

struct Pair {
    network: MemoryNetwork,
    x: PeerId,
    x_transport: MemoryTransport,
    x_discovery: MemoryDiscovery,
    y: PeerId,
    y_transport: MemoryTransport,
    y_discovery: MemoryDiscovery,
}

fn pair() -> Pair {
    let network = MemoryNetwork::new();
    let x = PeerId::random();
    let y = PeerId::random();
    let (x_transport, x_discovery) = network.node(x, vec![addr("/ip4/10.0.0.1/tcp/4001")]);
    let (y_transport, y_discovery) = network.node(y, vec![addr("/ip4/10.0.0.2/tcp/4001")]);
    Pair {
        network,
        x,
        x_transport,
        x_discovery,
        y,
        y_transport,
        y_discovery,
    }
}

#[tokio::test]
async fn connects_to_advertised_peer_and_skips_self() {
    let p = pair();
    let mut inbound = p.x_transport.incoming(protocol()).unwrap();
    tryst_net_discovery::DiscoveryService::advertise(&p.x_discovery, TAG)
        .await
        .unwrap();

    let recorder = Recorder::default();
    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, recorder.clone(), config());
    let stats = discovery.run_iteration().await;

    assert!(stats.advertised);
    assert_eq!(stats.discovered, 2);
    assert_eq!(stats.connected, 1);
    assert_eq!(stats.skipped(SkipReason::SelfId), 1);
    assert_eq!(recorder.peers(), vec![(p.x, Direction::Outbound)]);

    let (from, _stream) = inbound.next().await.unwrap();
    assert_eq!(from, p.y);
}

#[tokio::test]
async fn connected_peer_skipped_until_disconnected() {
    let p = pair();
    let _inbound = p.x_transport.incoming(protocol()).unwrap();
    tryst_net_discovery::DiscoveryService::advertise(&p.x_discovery, TAG)
        .await
        .unwrap();

    let recorder = Recorder::default();
    let y_transport = p.y_transport.clone();
    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, recorder.clone(), config());

    assert_eq!(discovery.run_iteration().await.connected, 1);
    assert_eq!(y_transport.connection_state(&p.x), ConnectionState::Connected);

    let stats = discovery.run_iteration().await;
    assert_eq!(stats.connected, 0);
    assert_eq!(stats.skipped(SkipReason::AlreadyConnected), 1);

    p.network.disconnect(p.x, p.y);
    let stats = discovery.run_iteration().await;
    assert_eq!(stats.connected, 1);
    assert_eq!(recorder.peers().len(), 2);
}

#[tokio::test]
async fn alias_and_empty_records_are_skipped() {
    let p = pair();
    let alias = PeerRecord::new(PeerId::random(), p.y_transport.local_addresses());
    let empty = PeerRecord::new(PeerId::random(), Vec::new());
    p.network.provide(TAG, alias);
    p.network.provide(TAG, empty);

    let recorder = Recorder::default();
    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, recorder.clone(), config());
    let stats = discovery.run_iteration().await;

    assert_eq!(stats.skipped(SkipReason::AddressCollision), 1);
    assert_eq!(stats.skipped(SkipReason::NoAddresses), 1);
    assert_eq!(stats.connected, 0);
    assert!(recorder.peers().is_empty());
}

#[tokio::test]
async fn duplicate_records_attempted_once_per_iteration() {
    let p = pair();
    let x_record = PeerRecord::new(p.x, p.x_transport.local_addresses());
    p.network.provide(TAG, x_record.clone());
    p.network.provide(TAG, x_record);
    p.network.set_unreachable(p.x, true);

    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, Recorder::default(), config());
    let stats = discovery.run_iteration().await;

    assert_eq!(stats.failed, 1);
    assert_eq!(stats.skipped(SkipReason::AlreadyAttempted), 1);

    // Failed peers are reconsidered on the next iteration.
    let stats = discovery.run_iteration().await;
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn failures_stay_inside_the_iteration() {
    let p = pair();
    p.network.set_failing_adverts(true);
    p.network.set_failing_queries(true);

    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, Recorder::default(), config());
    let stats = discovery.run_iteration().await;
    assert!(!stats.advertised);
    assert!(stats.query_failed);
    assert_eq!(stats.discovered, 0);

    // A failed advertisement does not prevent the query.
    p.network.set_failing_queries(false);
    let stats = discovery.run_iteration().await;
    assert!(!stats.advertised);
    assert!(!stats.query_failed);
}

#[tokio::test(start_paused = true)]
async fn loop_retries_until_peer_is_reachable() {
    let p = pair();
    let _inbound = p.x_transport.incoming(protocol()).unwrap();
    tryst_net_discovery::DiscoveryService::advertise(&p.x_discovery, TAG)
        .await
        .unwrap();
    p.network.set_unreachable(p.x, true);

    let recorder = Recorder::default();
    let (signal, shutdown) = signal();
    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, recorder.clone(), config());
    let task = tokio::spawn(discovery.run(shutdown));

    // First iteration runs after the initial delay.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(recorder.peers().is_empty());

    p.network.set_unreachable(p.x, false);
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(recorder.peers(), vec![(p.x, Direction::Outbound)]);

    signal.fire();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_initial_delay_stops_loop() {
    let p = pair();
    let recorder = Recorder::default();
    let (signal, shutdown) = signal();
    let discovery = DiscoveryLoop::new(p.y_transport, p.y_discovery, recorder.clone(), config());
    let task = tokio::spawn(discovery.run(shutdown));

    signal.fire();
    tokio::time::timeout(Duration::from_millis(100), task)
        .await
        .unwrap()
        .unwrap();
    assert!(recorder.peers().is_empty());
}
