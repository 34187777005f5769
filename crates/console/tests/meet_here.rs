//! Two nodes meeting under a shared rendezvous tag, in memory.

use libp2p::{Multiaddr, PeerId, StreamProtocol};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader, DuplexStream, duplex};
use tryst_console::{ConsoleBridge, PROMPT, display_line};
use tryst_net_discovery::{
    DiscoveryLoop, LoopConfig,
    test_utils::{MemoryNetwork, MemoryTransport},
};
use tryst_net_session::{InboundAcceptor, SessionRegistry};
use tryst_tasks::TaskManager;

const TIMEOUT: Duration = Duration::from_secs(5);

struct Node {
    stdin: DuplexStream,
    stdout: DuplexStream,
    registry: SessionRegistry,
    _manager: TaskManager,
}

fn start(network: &MemoryNetwork, id: PeerId, addr: &str) -> Node {
    let manager = TaskManager::current();
    let executor = manager.executor();
    let shutdown = executor.on_shutdown_signal().clone();
    let protocol = StreamProtocol::new("/chat/1.1.0");

    let addr: Multiaddr = addr.parse().unwrap();
    let (transport, discovery): (MemoryTransport, _) = network.node(id, vec![addr]);
    let (registry, events) = SessionRegistry::new(executor.clone());

    let acceptor = InboundAcceptor::new(&transport, protocol.clone(), registry.clone()).unwrap();
    executor.spawn("acceptor", acceptor.run(shutdown.clone()));

    let config = LoopConfig {
        rendezvous: "meet-here".to_string(),
        protocol,
        interval: Duration::from_millis(50),
        initial_delay: Duration::ZERO,
        address_check: true,
    };
    let discovery = DiscoveryLoop::new(transport, discovery, registry.clone(), config);
    executor.spawn_critical("discovery", discovery.run(shutdown.clone()));

    let (stdin, bridge_in) = duplex(1024);
    let (bridge_out, stdout) = duplex(1024);
    let bridge = ConsoleBridge::new(BufReader::new(bridge_in), bridge_out, registry.clone(), events);
    executor.spawn("console", bridge.run(shutdown));

    Node {
        stdin,
        stdout,
        registry,
        _manager: manager,
    }
}

async fn expect_output(stdout: &mut DuplexStream, expected: &str) {
    let mut buf = vec![0u8; expected.len()];
    tokio::time::timeout(TIMEOUT, stdout.read_exact(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(String::from_utf8(buf).unwrap(), expected);
}

async fn wait_for_session(node: &Node) {
    tokio::time::timeout(TIMEOUT, async {
        while node.registry.is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn two_nodes_meet_and_chat() {
    let network = MemoryNetwork::new();
    let (x_id, y_id) = (PeerId::random(), PeerId::random());

    let mut x = start(&network, x_id, "/ip4/10.0.0.1/tcp/4001");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let mut y = start(&network, y_id, "/ip4/10.0.0.2/tcp/4001");

    wait_for_session(&y).await;
    wait_for_session(&x).await;
    assert_eq!(y.registry.newest().unwrap().peer, x_id);
    assert_eq!(x.registry.newest().unwrap().peer, y_id);

    expect_output(&mut x.stdout, PROMPT).await;
    expect_output(&mut y.stdout, PROMPT).await;

    y.stdin.write_all(b"hello\n").await.unwrap();
    expect_output(&mut x.stdout, &display_line("hello")).await;

    x.stdin.write_all(b"hi\n").await.unwrap();
    expect_output(&mut y.stdout, &format!("{PROMPT}{}", display_line("hi"))).await;

    // Neither node connected to itself or twice to the other.
    assert_eq!(x.registry.len(), 1);
    assert_eq!(y.registry.len(), 1);
}
