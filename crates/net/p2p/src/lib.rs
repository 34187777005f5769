//! libp2p implementation of the tryst collaborator traits.
//!
//! # Transport Stack
//!
//! ```text
//! DNS (resolves /dnsaddr/, /dns/, /dns4/, /dns6/)
//!   └── TCP
//!         └── Noise (encryption)
//!               └── Yamux (multiplexing)
//! ```
//!
//! # Behaviours
//!
//! - Kademlia: rendezvous records (provider records keyed by the tag)
//! - Identify: exchange listen addresses and agent versions
//! - Ping: keep connections alive
//! - Stream: raw protocol streams for chat sessions
//!
//! The swarm is owned by a [`NetworkService`] task. Everything else talks to it
//! through a cloneable [`NetworkHandle`], which implements
//! [`Transport`](tryst_net_discovery::Transport) and
//! [`DiscoveryService`](tryst_net_discovery::DiscoveryService).

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod behaviour;
mod book;
mod command;
mod config;
mod error;
mod handle;
mod metrics;
mod service;
mod stream;

pub use book::{split_peer_id, strip_peer_id};
pub use config::P2pConfig;
pub use error::NetworkError;
pub use handle::{NetworkHandle, rendezvous_key};
pub use service::NetworkService;
pub use stream::TrackedStream;
