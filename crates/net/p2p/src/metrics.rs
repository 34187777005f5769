//! Network metrics.

use metrics::{Counter, Gauge};

/// Open chat streams across all peers.
pub(crate) const LIVE_STREAMS_GAUGE: &str = "network.chat_streams";

/// Swarm connection metrics.
#[derive(Clone, Debug)]
pub(crate) struct NetworkMetrics {
    /// Number of established connections
    pub(crate) connections_established_total: Counter,
    /// Number of closed connections
    pub(crate) connections_closed_total: Counter,
    /// Number of failed outgoing connections
    pub(crate) dial_failures_total: Counter,
    /// Number of connected peers
    pub(crate) connected_peers: Gauge,
    /// Number of rendezvous provider publications started
    pub(crate) provider_publications_total: Counter,
    /// Number of rendezvous provider queries started
    pub(crate) provider_queries_total: Counter,
}

impl Default for NetworkMetrics {
    fn default() -> Self {
        Self {
            connections_established_total: metrics::counter!(
                "network.connections_established_total"
            ),
            connections_closed_total: metrics::counter!("network.connections_closed_total"),
            dial_failures_total: metrics::counter!("network.dial_failures_total"),
            connected_peers: metrics::gauge!("network.connected_peers"),
            provider_publications_total: metrics::counter!("network.provider_publications_total"),
            provider_queries_total: metrics::counter!("network.provider_queries_total"),
        }
    }
}
