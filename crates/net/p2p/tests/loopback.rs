//! Two libp2p nodes on the loopback interface.

use assert_matches::assert_matches;
use futures::{AsyncReadExt, AsyncWriteExt, StreamExt};
use libp2p::{PeerId, StreamProtocol, identity::Keypair};
use std::{future::Future, time::Duration};
use tryst_net_discovery::{ConnectionTable, DiscoveryService, Transport, TransportError};
use tryst_net_p2p::{NetworkError, NetworkHandle, NetworkService, P2pConfig};
use tryst_tasks::{TaskExecutor, TaskManager};

const TIMEOUT: Duration = Duration::from_secs(20);

fn loopback_config() -> P2pConfig {
    P2pConfig {
        listen_addrs: vec!["/ip4/127.0.0.1/tcp/0".parse().unwrap()],
        ..Default::default()
    }
}

async fn start_node(executor: &TaskExecutor) -> NetworkHandle {
    let (mut service, handle) =
        NetworkService::new(loopback_config(), Keypair::generate_ed25519()).unwrap();
    service.start().await.unwrap();
    executor.spawn("network", service.run(executor.on_shutdown_signal().clone()));
    handle
}

async fn within<F: Future>(fut: F) -> F::Output {
    tokio::time::timeout(TIMEOUT, fut).await.expect("timed out")
}

#[tokio::test]
async fn listen_addresses_are_reported_after_start() {
    let manager = TaskManager::current();
    let node = start_node(&manager.executor()).await;

    let addrs = node.local_addresses();
    assert!(!addrs.is_empty());
    assert!(addrs.iter().all(|addr| addr.to_string().starts_with("/ip4/127.0.0.1/tcp/")));
}

#[tokio::test]
async fn bootnode_needs_peer_id() {
    let config = P2pConfig {
        bootnodes: vec!["/ip4/10.0.0.1/tcp/4001".parse().unwrap()],
        ..loopback_config()
    };
    assert!(matches!(
        NetworkService::new(config, Keypair::generate_ed25519()),
        Err(NetworkError::BootnodeWithoutPeerId(_))
    ));
}

#[tokio::test]
async fn stream_between_two_nodes() {
    let manager = TaskManager::current();
    let executor = manager.executor();
    let a = start_node(&executor).await;
    let b = start_node(&executor).await;
    let protocol = StreamProtocol::new("/chat/1.1.0");

    let mut incoming = a.incoming(protocol.clone()).unwrap();
    assert!(matches!(
        a.incoming(protocol.clone()),
        Err(TransportError::AlreadyRegistered(_))
    ));

    b.add_peer_addresses(a.local_peer_id(), a.local_addresses())
        .await
        .unwrap();
    let mut outbound = within(b.open_stream(a.local_peer_id(), protocol))
        .await
        .unwrap();
    assert!(b.connection_state(&a.local_peer_id()).is_connected());

    outbound.write_all(b"hello\n").await.unwrap();
    outbound.flush().await.unwrap();

    let (peer, mut inbound) = within(incoming.next()).await.unwrap();
    assert_eq!(peer, b.local_peer_id());
    assert!(a.connection_state(&peer).is_connected());

    let mut buf = [0u8; 6];
    within(inbound.read_exact(&mut buf)).await.unwrap();
    assert_eq!(&buf, b"hello\n");

    drop(inbound);
    assert!(!a.connection_state(&peer).is_connected());
    drop(outbound);
    assert!(!b.connection_state(&a.local_peer_id()).is_connected());
}

#[tokio::test]
async fn stream_to_unknown_peer_fails() {
    let manager = TaskManager::current();
    let node = start_node(&manager.executor()).await;
    let stranger = PeerId::random();

    assert_matches!(
        within(node.open_stream(stranger, StreamProtocol::new("/chat/1.1.0"))).await,
        Err(TransportError::OpenStream { peer, .. }) if peer == stranger
    );
    assert!(!node.connection_state(&stranger).is_connected());
}

#[tokio::test]
async fn rendezvous_through_the_dht() {
    let manager = TaskManager::current();
    let executor = manager.executor();
    let a = start_node(&executor).await;
    let b = start_node(&executor).await;

    b.add_peer_addresses(a.local_peer_id(), a.local_addresses())
        .await
        .unwrap();
    a.advertise("meet-here").await.unwrap();
    // Repeating is harmless.
    a.advertise("meet-here").await.unwrap();

    let record = within(async {
        loop {
            let records: Vec<_> = b.find_peers("meet-here").await.unwrap().collect().await;
            if let Some(record) = records.into_iter().find(|r| r.id == a.local_peer_id()) {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    })
    .await;

    assert!(!record.addresses.is_empty());
    for addr in a.local_addresses() {
        assert!(record.addresses.contains(&addr));
    }

    // Nobody advertises this one.
    let records = within(async {
        b.find_peers("elsewhere")
            .await
            .unwrap()
            .collect::<Vec<_>>()
            .await
    })
    .await;
    assert!(records.iter().all(|r| r.id != a.local_peer_id()));
}

#[tokio::test]
async fn departed_peer_is_disconnected() {
    let manager = TaskManager::current();
    let a = start_node(&manager.executor()).await;
    let departing = TaskManager::current();
    let b = start_node(&departing.executor()).await;
    let protocol = StreamProtocol::new("/chat/1.1.0");

    let mut incoming = a.incoming(protocol.clone()).unwrap();
    let mut departures = a.disconnections();
    b.add_peer_addresses(a.local_peer_id(), a.local_addresses())
        .await
        .unwrap();
    let outbound = within(b.open_stream(a.local_peer_id(), protocol))
        .await
        .unwrap();
    let (peer, _inbound) = within(incoming.next()).await.unwrap();
    assert!(a.connection_state(&peer).is_connected());

    // `b` goes away without closing its stream; `a` still holds its end.
    drop(outbound);
    assert!(departing.graceful_shutdown(TIMEOUT).await);
    drop(b);

    assert_eq!(within(departures.next()).await, Some(peer));
    assert!(!a.connection_state(&peer).is_connected());
}
