//! Session metrics.

use metrics::{Counter, Gauge};

#[derive(Clone, Debug)]
pub(crate) struct SessionMetrics {
    /// Number of sessions opened
    pub(crate) opened_total: Counter,
    /// Number of sessions closed
    pub(crate) closed_total: Counter,
    /// Number of live sessions
    pub(crate) active: Gauge,
    /// Number of lines received from peers
    pub(crate) lines_received_total: Counter,
    /// Number of lines sent to peers
    pub(crate) lines_sent_total: Counter,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            opened_total: metrics::counter!("session.opened_total"),
            closed_total: metrics::counter!("session.closed_total"),
            active: metrics::gauge!("session.active"),
            lines_received_total: metrics::counter!("session.lines_received_total"),
            lines_sent_total: metrics::counter!("session.lines_sent_total"),
        }
    }
}
