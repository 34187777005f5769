//! The rendezvous discovery loop.

use crate::{
    Decision, Direction, DiscoveryService, IterationFilter, LocalNode, SkipReason, StreamHandler,
    Transport, metrics::DiscoveryMetrics,
};
use futures::StreamExt;
use libp2p::StreamProtocol;
use std::{collections::HashMap, time::Duration};
use tracing::{Instrument, debug, info, warn};
use tryst_tasks::Shutdown;

/// Settings of one [`DiscoveryLoop`].
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Tag advertised and searched for.
    pub rendezvous: String,
    /// Protocol of the streams opened to discovered peers.
    pub protocol: StreamProtocol,
    /// Pause between iterations.
    pub interval: Duration,
    /// Pause before the first iteration.
    pub initial_delay: Duration,
    /// Skip peers sharing an address with this node.
    pub address_check: bool,
}

/// What one iteration did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IterationStats {
    /// Whether advertising succeeded.
    pub advertised: bool,
    /// Whether the peer query failed.
    pub query_failed: bool,
    /// Records received.
    pub discovered: usize,
    /// Streams opened.
    pub connected: usize,
    /// Streams that failed to open.
    pub failed: usize,
    /// Records skipped, by reason.
    pub skipped: HashMap<SkipReason, usize>,
}

impl IterationStats {
    pub fn skipped(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or_default()
    }

    pub fn total_skipped(&self) -> usize {
        self.skipped.values().sum()
    }
}

/// Periodically advertises the rendezvous tag, looks up the peers sharing it and
/// opens a stream to every eligible one.
///
/// Failures inside an iteration are logged and never end the loop; only the
/// shutdown signal does.
pub struct DiscoveryLoop<T, D, H> {
    transport: T,
    discovery: D,
    handler: H,
    config: LoopConfig,
    metrics: DiscoveryMetrics,
}

impl<T, D, H> DiscoveryLoop<T, D, H>
where
    T: Transport,
    D: DiscoveryService,
    H: StreamHandler<T::Stream>,
{
    pub fn new(transport: T, discovery: D, handler: H, config: LoopConfig) -> Self {
        Self {
            transport,
            discovery,
            handler,
            config,
            metrics: DiscoveryMetrics::default(),
        }
    }

    /// Runs until `shutdown` resolves.
    ///
    /// An iteration in progress is abandoned at its current suspension point.
    pub async fn run(self, mut shutdown: Shutdown) {
        info!(
            rendezvous = %self.config.rendezvous,
            protocol = %self.config.protocol,
            "Starting peer discovery"
        );

        let mut pause = self.config.initial_delay;
        let mut iteration: u64 = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => {}
            }
            pause = self.config.interval;
            iteration += 1;

            let span = tracing::debug_span!("discovery", iteration);
            let stats = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                stats = self.run_iteration().instrument(span) => stats,
            };
            self.metrics.record(&stats);
            debug!(
                iteration,
                discovered = stats.discovered,
                connected = stats.connected,
                failed = stats.failed,
                skipped = stats.total_skipped(),
                "Discovery iteration finished"
            );
        }

        info!("Peer discovery stopped");
    }

    /// Runs one advertise, query and connect pass.
    pub async fn run_iteration(&self) -> IterationStats {
        let mut stats = IterationStats::default();
        let tag = self.config.rendezvous.as_str();

        match self.discovery.advertise(tag).await {
            Ok(()) => stats.advertised = true,
            Err(err) => warn!(%err, "Failed to advertise rendezvous"),
        }

        let mut peers = match self.discovery.find_peers(tag).await {
            Ok(peers) => peers,
            Err(err) => {
                warn!(%err, "Peer query failed");
                stats.query_failed = true;
                return stats;
            }
        };

        let local = LocalNode::new(
            self.transport.local_peer_id(),
            self.transport.local_addresses(),
        );
        let mut filter = IterationFilter::new(&local, self.config.address_check);

        while let Some(record) = peers.next().await {
            stats.discovered += 1;

            match filter.evaluate(&record, &self.transport) {
                Decision::Skip(reason) => {
                    debug!(peer = %record.id, %reason, "Skipping peer");
                    *stats.skipped.entry(reason).or_default() += 1;
                }
                Decision::Connect => {
                    match self
                        .transport
                        .open_stream(record.id, self.config.protocol.clone())
                        .await
                    {
                        Ok(stream) => {
                            info!(peer = %record.id, "Connected to peer");
                            stats.connected += 1;
                            self.handler
                                .handle_stream(record.id, Direction::Outbound, stream);
                        }
                        Err(err) => {
                            warn!(peer = %record.id, %err, "Failed to open stream");
                            stats.failed += 1;
                        }
                    }
                }
            }
        }

        stats
    }
}
