use crate::P2pConfig;
use libp2p::{
    identify,
    identity::Keypair,
    kad::{self, store::MemoryStore},
    ping,
    swarm::NetworkBehaviour,
};
use std::time::Duration;

/// Upper bound for a single Kademlia query.
const QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Combined network behaviour for a tryst node.
#[derive(NetworkBehaviour)]
pub(crate) struct Behaviour {
    /// Kademlia DHT - rendezvous provider records.
    pub(crate) kad: kad::Behaviour<MemoryStore>,

    /// Identify protocol - exchange peer info.
    pub(crate) identify: identify::Behaviour,

    /// Ping protocol - keep connections alive.
    pub(crate) ping: ping::Behaviour,

    /// Raw streams for chat sessions.
    pub(crate) stream: libp2p_stream::Behaviour,
}

impl Behaviour {
    pub(crate) fn new(key: &Keypair, config: &P2pConfig) -> Self {
        let peer_id = key.public().to_peer_id();

        let mut kad_config = kad::Config::new(config.kad_protocol.clone());
        kad_config.set_query_timeout(QUERY_TIMEOUT);
        let mut kad = kad::Behaviour::with_config(peer_id, MemoryStore::new(peer_id), kad_config);
        // Answer queries even before an external address is confirmed.
        kad.set_mode(Some(kad::Mode::Server));

        Self {
            kad,
            identify: identify::Behaviour::new(
                identify::Config::new(config.protocol_version.clone(), key.public())
                    .with_agent_version(config.agent_version.clone()),
            ),
            ping: ping::Behaviour::new(ping::Config::new().with_interval(config.ping_interval)),
            stream: libp2p_stream::Behaviour::new(),
        }
    }
}
