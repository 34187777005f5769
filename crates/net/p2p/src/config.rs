use libp2p::{Multiaddr, StreamProtocol, multiaddr::Protocol};
use std::{net::Ipv4Addr, time::Duration};

/// Settings for the libp2p swarm.
#[derive(Debug, Clone)]
pub struct P2pConfig {
    /// Listen addresses for incoming connections.
    pub listen_addrs: Vec<Multiaddr>,

    /// Bootnodes to connect to on startup. Each must end in `/p2p/<peer id>`.
    pub bootnodes: Vec<Multiaddr>,

    /// Kademlia protocol name.
    pub kad_protocol: StreamProtocol,

    /// Connection idle timeout.
    pub idle_timeout: Duration,

    /// How long [`NetworkService::start`](crate::NetworkService::start) waits
    /// for the first listen address.
    pub listen_timeout: Duration,

    /// Ping interval.
    pub ping_interval: Duration,

    /// Minimum time between two provider publications for the same tag.
    pub readvertise_interval: Duration,

    /// Protocol version sent with identify.
    pub protocol_version: String,

    /// Agent version sent with identify.
    pub agent_version: String,
}

impl Default for P2pConfig {
    fn default() -> Self {
        Self {
            listen_addrs: vec![
                Multiaddr::empty()
                    .with(Protocol::Ip4(Ipv4Addr::UNSPECIFIED))
                    .with(Protocol::Tcp(0)),
            ],
            bootnodes: Vec::new(),
            kad_protocol: StreamProtocol::new("/ipfs/kad/1.0.0"),
            idle_timeout: Duration::from_secs(60),
            listen_timeout: Duration::from_secs(5),
            ping_interval: Duration::from_secs(15),
            readvertise_interval: Duration::from_secs(600),
            protocol_version: "/tryst/1.0.0".to_string(),
            agent_version: concat!("tryst/v", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
