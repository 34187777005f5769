//! Discovery loop metrics.

use crate::IterationStats;
use metrics::Counter;

/// Discovery loop counters.
#[derive(Clone, Debug)]
pub(crate) struct DiscoveryMetrics {
    /// Number of completed iterations
    iterations_total: Counter,
    /// Number of peer records received from the discovery service
    peers_discovered_total: Counter,
    /// Number of outbound streams opened
    streams_opened_total: Counter,
    /// Number of failed stream opens
    streams_failed_total: Counter,
    /// Number of failed advertisements
    advertise_failures_total: Counter,
    /// Number of failed queries
    query_failures_total: Counter,
}

impl Default for DiscoveryMetrics {
    fn default() -> Self {
        Self {
            iterations_total: metrics::counter!("discovery.iterations_total"),
            peers_discovered_total: metrics::counter!("discovery.peers_discovered_total"),
            streams_opened_total: metrics::counter!("discovery.streams_opened_total"),
            streams_failed_total: metrics::counter!("discovery.streams_failed_total"),
            advertise_failures_total: metrics::counter!("discovery.advertise_failures_total"),
            query_failures_total: metrics::counter!("discovery.query_failures_total"),
        }
    }
}

impl DiscoveryMetrics {
    pub(crate) fn record(&self, stats: &IterationStats) {
        self.iterations_total.increment(1);
        self.peers_discovered_total.increment(stats.discovered as u64);
        self.streams_opened_total.increment(stats.connected as u64);
        self.streams_failed_total.increment(stats.failed as u64);
        if !stats.advertised {
            self.advertise_failures_total.increment(1);
        }
        if stats.query_failed {
            self.query_failures_total.increment(1);
        }
        for (reason, count) in &stats.skipped {
            let reason: &'static str = (*reason).into();
            metrics::counter!("discovery.peers_skipped_total", "reason" => reason)
                .increment(*count as u64);
        }
    }
}

