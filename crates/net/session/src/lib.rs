//! Chat stream sessions.
//!
//! A session owns one duplex stream to one peer and runs two loops over it: the
//! read loop turns incoming lines into [`SessionEvent::Line`]s, the write loop
//! sends the lines queued with [`SessionRegistry::send`]. Sessions are started by
//! the discovery loop (outbound, through [`SessionRegistry`]'s
//! [`StreamHandler`](tryst_net_discovery::StreamHandler) impl) and by the
//! [`InboundAcceptor`].

#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod acceptor;
mod error;
mod metrics;
mod registry;
mod session;

pub use acceptor::InboundAcceptor;
pub use error::SessionError;
pub use registry::{SessionEvents, SessionRegistry};
pub use session::{SessionEvent, SessionId, SessionInfo};
