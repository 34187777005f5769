//! Rendezvous discovery for tryst nodes.
//!
//! - [`DiscoveryLoop`] advertises a rendezvous tag, queries the peers sharing it and
//!   opens a stream to each eligible one, until shutdown.
//! - [`should_connect`] and [`IterationFilter`] decide which discovered peers are
//!   eligible: never this node, never a record without addresses, never a record
//!   sharing an address with this node, never a peer already connected, and at most
//!   one attempt per peer per iteration.
//! - [`Transport`] and [`DiscoveryService`] are the collaborator contracts. The
//!   libp2p implementation lives in `tryst-net-p2p`; an in-memory one is available
//!   behind the `test-utils` feature.

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod address;
mod dedup;
mod error;
mod metrics;
mod record;
mod service;
mod traits;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use address::{CanonicalAddress, intersects};
pub use dedup::{Decision, IterationFilter, LocalNode, SkipReason, should_connect};
pub use error::{DiscoveryError, TransportError};
pub use record::PeerRecord;
pub use service::{DiscoveryLoop, IterationStats, LoopConfig};
pub use traits::{
    ConnectionState, ConnectionTable, Direction, DiscoveryService, StreamHandler, Transport,
};
