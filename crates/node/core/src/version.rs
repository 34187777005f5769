//! Version information for the Tryst node.

/// The version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// The version information for libp2p identification.
pub const P2P_CLIENT_VERSION: &str = concat!("tryst/v", env!("CARGO_PKG_VERSION"));
