//! The task that owns the libp2p swarm.

use crate::{
    NetworkError, P2pConfig,
    behaviour::{Behaviour, BehaviourEvent},
    book::{AddressBook, split_peer_id, strip_peer_id},
    command::Command,
    handle::NetworkHandle,
    metrics::NetworkMetrics,
    stream::LiveStreams,
};
use futures::StreamExt;
use libp2p::{
    Multiaddr, PeerId, Swarm, SwarmBuilder, identify,
    identity::Keypair,
    kad::{self, QueryId, RecordKey},
    noise,
    swarm::{
        DialError, SwarmEvent,
        dial_opts::{DialOpts, PeerCondition},
    },
    tcp, yamux,
};
use parking_lot::RwLock;
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};
use tryst_net_discovery::{DiscoveryError, PeerRecord};
use tryst_tasks::Shutdown;

/// Pending commands per service.
const COMMAND_BUFFER: usize = 64;

/// An in-flight provider query.
struct ProviderQuery {
    records: mpsc::UnboundedSender<PeerRecord>,
    seen: HashSet<PeerId>,
}

/// A closest-peers lookup resolving the addresses of one provider.
struct Lookup {
    peer: PeerId,
    records: mpsc::UnboundedSender<PeerRecord>,
}

/// Drives the swarm and answers [`NetworkHandle`] commands.
pub struct NetworkService {
    swarm: Swarm<Behaviour>,
    config: P2pConfig,
    local_peer_id: PeerId,
    local_addresses: Arc<RwLock<Vec<Multiaddr>>>,
    bootnodes: Vec<(PeerId, Multiaddr)>,
    commands: mpsc::Receiver<Command>,
    book: AddressBook,
    /// Last publication per rendezvous key.
    advertised: HashMap<RecordKey, Instant>,
    publications: HashMap<QueryId, RecordKey>,
    provider_queries: HashMap<QueryId, ProviderQuery>,
    lookups: HashMap<QueryId, Lookup>,
    pending_dials: HashMap<PeerId, Vec<oneshot::Sender<Result<(), String>>>>,
    live: LiveStreams,
    metrics: NetworkMetrics,
}

impl NetworkService {
    /// Builds the swarm. Nothing is started until [`start`](Self::start).
    pub fn new(config: P2pConfig, keypair: Keypair) -> Result<(Self, NetworkHandle), NetworkError> {
        info!("Initializing P2P network...");

        let bootnodes = config
            .bootnodes
            .iter()
            .map(|addr| {
                split_peer_id(addr).ok_or_else(|| NetworkError::BootnodeWithoutPeerId(addr.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let swarm = SwarmBuilder::with_existing_identity(keypair)
            .with_tokio()
            .with_tcp(tcp::Config::default(), noise::Config::new, yamux::Config::default)
            .map_err(|err| NetworkError::Build(err.to_string()))?
            .with_dns()
            .map_err(|err| NetworkError::Build(err.to_string()))?
            .with_behaviour(|key| Behaviour::new(key, &config))
            .map_err(|err| NetworkError::Build(err.to_string()))?
            .with_swarm_config(|cfg| cfg.with_idle_connection_timeout(config.idle_timeout))
            .build();

        let local_peer_id = *swarm.local_peer_id();
        info!(%local_peer_id, "Local peer ID");

        let local_addresses = Arc::new(RwLock::new(Vec::new()));
        let live = LiveStreams::default();
        let control = swarm.behaviour().stream.new_control();
        let (tx, commands) = mpsc::channel(COMMAND_BUFFER);

        let handle =
            NetworkHandle::new(local_peer_id, local_addresses.clone(), live.clone(), control, tx);
        let service = Self {
            swarm,
            config,
            local_peer_id,
            local_addresses,
            bootnodes,
            commands,
            book: AddressBook::default(),
            advertised: HashMap::new(),
            publications: HashMap::new(),
            provider_queries: HashMap::new(),
            lookups: HashMap::new(),
            pending_dials: HashMap::new(),
            live,
            metrics: NetworkMetrics::default(),
        };
        Ok((service, handle))
    }

    /// Starts listening, waits for the first listen address and joins the DHT.
    pub async fn start(&mut self) -> Result<(), NetworkError> {
        for addr in self.config.listen_addrs.clone() {
            self.swarm
                .listen_on(addr.clone())
                .map_err(|err| NetworkError::Listen {
                    addr,
                    reason: err.to_string(),
                })?;
        }

        let timeout = self.config.listen_timeout;
        tokio::time::timeout(timeout, async {
            loop {
                let event = self.swarm.select_next_some().await;
                let listening = matches!(event, SwarmEvent::NewListenAddr { .. });
                self.on_swarm_event(event);
                if listening {
                    break;
                }
            }
        })
        .await
        .map_err(|_| NetworkError::ListenTimeout(timeout))?;

        self.connect_bootnodes();
        Ok(())
    }

    /// Runs the event loop until `shutdown` resolves.
    pub async fn run(mut self, mut shutdown: Shutdown) {
        info!("Starting network event loop");
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                Some(command) = self.commands.recv() => self.on_command(command),
                event = self.swarm.select_next_some() => self.on_swarm_event(event),
            }
        }
        info!("Network event loop stopped");
    }

    fn connect_bootnodes(&mut self) {
        if self.bootnodes.is_empty() {
            warn!("No bootnodes configured");
            return;
        }

        info!(count = self.bootnodes.len(), "Connecting to bootnodes...");
        for (peer, addr) in &self.bootnodes {
            self.swarm.behaviour_mut().kad.add_address(peer, addr.clone());
            self.book.insert(*peer, addr.clone());
            let opts = DialOpts::peer_id(*peer).addresses(vec![addr.clone()]).build();
            match self.swarm.dial(opts) {
                Ok(()) => debug!(%peer, %addr, "Dial initiated"),
                Err(err) => warn!(%peer, %addr, %err, "Failed to dial bootnode"),
            }
        }

        if let Err(err) = self.swarm.behaviour_mut().kad.bootstrap() {
            warn!(%err, "Failed to start DHT bootstrap");
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Provide { key, reply } => {
                let _ = reply.send(self.provide(key));
            }
            Command::FindProviders { key, records } => {
                self.metrics.provider_queries_total.increment(1);
                let id = self.swarm.behaviour_mut().kad.get_providers(key);
                self.provider_queries.insert(
                    id,
                    ProviderQuery {
                        records,
                        seen: HashSet::new(),
                    },
                );
            }
            Command::Connect { peer, reply } => self.connect(peer, reply),
            Command::AddAddresses { peer, addrs } => {
                for addr in addrs {
                    let addr = strip_peer_id(addr);
                    self.swarm.behaviour_mut().kad.add_address(&peer, addr.clone());
                    self.book.insert(peer, addr);
                }
            }
        }
    }

    fn provide(&mut self, key: RecordKey) -> Result<(), DiscoveryError> {
        let interval = self.config.readvertise_interval;
        if self.advertised.get(&key).is_some_and(|last| last.elapsed() < interval) {
            trace!("Rendezvous record published recently");
            return Ok(());
        }

        let id = self
            .swarm
            .behaviour_mut()
            .kad
            .start_providing(key.clone())
            .map_err(|err| DiscoveryError::Advertise(err.to_string()))?;
        self.metrics.provider_publications_total.increment(1);
        self.advertised.insert(key.clone(), Instant::now());
        self.publications.insert(id, key);
        Ok(())
    }

    fn connect(&mut self, peer: PeerId, reply: oneshot::Sender<Result<(), String>>) {
        if self.swarm.is_connected(&peer) {
            let _ = reply.send(Ok(()));
            return;
        }

        let opts = DialOpts::peer_id(peer)
            .addresses(self.book.get(&peer))
            .condition(PeerCondition::DisconnectedAndNotDialing)
            .build();
        match self.swarm.dial(opts) {
            // A dial already in flight resolves the reply as well.
            Ok(()) | Err(DialError::DialPeerConditionFalse(_)) => {
                self.pending_dials.entry(peer).or_default().push(reply);
            }
            Err(err) => {
                let _ = reply.send(Err(err.to_string()));
            }
        }
    }

    fn on_swarm_event(&mut self, event: SwarmEvent<BehaviourEvent>) {
        match event {
            SwarmEvent::NewListenAddr { address, .. } => {
                info!(%address, "Listening on address");
                let mut local = self.local_addresses.write();
                if !local.contains(&address) {
                    local.push(address);
                }
            }
            SwarmEvent::ExpiredListenAddr { address, .. } => {
                debug!(%address, "Listen address expired");
                self.local_addresses.write().retain(|known| known != &address);
            }
            SwarmEvent::ExternalAddrConfirmed { address } => {
                info!(%address, "External address confirmed");
                let mut local = self.local_addresses.write();
                if !local.contains(&address) {
                    local.push(address);
                }
            }
            SwarmEvent::ListenerClosed {
                addresses, reason, ..
            } => {
                if let Err(err) = reason {
                    warn!(%err, "Listener closed");
                }
                self.local_addresses
                    .write()
                    .retain(|known| !addresses.contains(known));
            }
            SwarmEvent::ConnectionEstablished {
                peer_id,
                endpoint,
                num_established,
                ..
            } => {
                self.metrics.connections_established_total.increment(1);
                self.metrics
                    .connected_peers
                    .set(self.swarm.connected_peers().count() as f64);
                debug!(
                    peer = %peer_id,
                    address = %endpoint.get_remote_address(),
                    num_established = num_established.get(),
                    "Connection established"
                );

                // Listener-side remote addresses are ephemeral ports.
                if endpoint.is_dialer() {
                    self.book.insert(peer_id, endpoint.get_remote_address().clone());
                }
                for reply in self.pending_dials.remove(&peer_id).into_iter().flatten() {
                    let _ = reply.send(Ok(()));
                }
            }
            SwarmEvent::ConnectionClosed {
                peer_id,
                num_established,
                cause,
                ..
            } => {
                self.metrics.connections_closed_total.increment(1);
                self.metrics
                    .connected_peers
                    .set(self.swarm.connected_peers().count() as f64);
                debug!(peer = %peer_id, num_established, ?cause, "Connection closed");
                if num_established == 0 {
                    self.live.disconnected(peer_id);
                }
            }
            SwarmEvent::OutgoingConnectionError {
                peer_id: Some(peer_id),
                error,
                ..
            } => {
                self.metrics.dial_failures_total.increment(1);
                debug!(peer = %peer_id, %error, "Outgoing connection failed");
                let reason = error.to_string();
                for reply in self.pending_dials.remove(&peer_id).into_iter().flatten() {
                    let _ = reply.send(Err(reason.clone()));
                }
            }
            SwarmEvent::Behaviour(BehaviourEvent::Identify(identify::Event::Received {
                peer_id,
                info,
                ..
            })) => {
                trace!(peer = %peer_id, agent = %info.agent_version, "Identified peer");
                self.book.extend(peer_id, info.listen_addrs);
            }
            SwarmEvent::Behaviour(BehaviourEvent::Kad(event)) => self.on_kad_event(event),
            _ => {}
        }
    }

    fn on_kad_event(&mut self, event: kad::Event) {
        match event {
            kad::Event::RoutingUpdated {
                peer,
                addresses,
                old_peer,
                ..
            } => {
                self.book.extend(peer, addresses.into_vec());
                if let Some(evicted) = old_peer {
                    self.book.remove(&evicted);
                    trace!(peer = %evicted, known = self.book.len(), "Dropped from routing table");
                }
            }
            kad::Event::OutboundQueryProgressed {
                id, result, step, ..
            } => match result {
                kad::QueryResult::StartProviding(result) => self.on_published(id, result),
                kad::QueryResult::GetProviders(result) => self.on_providers(id, result, step.last),
                kad::QueryResult::GetClosestPeers(result) => self.on_lookup(id, result),
                kad::QueryResult::Bootstrap(Ok(ok)) => {
                    debug!(remaining = ok.num_remaining, "DHT bootstrap progressed");
                }
                kad::QueryResult::Bootstrap(Err(err)) => warn!(%err, "DHT bootstrap failed"),
                _ => {}
            },
            _ => {}
        }
    }

    fn on_published(
        &mut self,
        id: QueryId,
        result: Result<kad::AddProviderOk, kad::AddProviderError>,
    ) {
        let Some(key) = self.publications.remove(&id) else {
            return;
        };
        match result {
            Ok(_) => debug!("Rendezvous record published"),
            Err(err) => {
                warn!(%err, "Failed to publish rendezvous record");
                // Publish again on the next advertise.
                self.advertised.remove(&key);
            }
        }
    }

    fn on_providers(
        &mut self,
        id: QueryId,
        result: Result<kad::GetProvidersOk, kad::GetProvidersError>,
        last: bool,
    ) {
        match result {
            Ok(kad::GetProvidersOk::FoundProviders { providers, .. }) => {
                for provider in providers {
                    self.on_provider(id, provider);
                }
            }
            Ok(_) => {}
            Err(err) => debug!(%err, "Provider query ended early"),
        }

        if last && let Some(query) = self.provider_queries.remove(&id) {
            debug!(found = query.seen.len(), "Provider query finished");
        }
    }

    fn on_provider(&mut self, id: QueryId, provider: PeerId) {
        let Some(query) = self.provider_queries.get_mut(&id) else {
            return;
        };
        if !query.seen.insert(provider) {
            return;
        }

        if provider == self.local_peer_id {
            let addresses = self.local_addresses.read().clone();
            let _ = query.records.send(PeerRecord::new(provider, addresses));
            return;
        }

        let addresses = self.book.get(&provider);
        if !addresses.is_empty() {
            let _ = query.records.send(PeerRecord::new(provider, addresses));
            return;
        }

        // Unknown provider: look up its addresses before reporting it.
        let records = query.records.clone();
        let lookup = self.swarm.behaviour_mut().kad.get_closest_peers(provider);
        self.lookups.insert(
            lookup,
            Lookup {
                peer: provider,
                records,
            },
        );
    }

    fn on_lookup(
        &mut self,
        id: QueryId,
        result: Result<kad::GetClosestPeersOk, kad::GetClosestPeersError>,
    ) {
        let Some(lookup) = self.lookups.remove(&id) else {
            return;
        };
        match result {
            Ok(ok) => {
                if let Some(info) = ok.peers.into_iter().find(|info| info.peer_id == lookup.peer) {
                    self.book.extend(info.peer_id, info.addrs);
                }
            }
            Err(err) => debug!(peer = %lookup.peer, %err, "Provider lookup failed"),
        }
        let _ = lookup
            .records
            .send(PeerRecord::new(lookup.peer, self.book.get(&lookup.peer)));
    }
}
