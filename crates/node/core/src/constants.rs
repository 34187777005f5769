//! Constants used throughout the Tryst node.
//!
//! All magic numbers and default values should be defined here or at the top
//! of specific modules if they are tightly coupled to that module's logic.

// =============================================================================
// Network Addresses
// =============================================================================

/// Default listen address: all IPv4 interfaces, random TCP port.
pub const DEFAULT_LISTEN_ADDR: &str = "/ip4/0.0.0.0/tcp/0";

/// Public libp2p bootstrap nodes, used when no bootnode is configured.
pub const DEFAULT_BOOTNODES: &[&str] = &[
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmNnooDu7bfjPFoTZYxMNLWUQJyrVwtbZg5gBMjTezGAJN",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmQCU2EcMqAqQPR2i9bChDtGNJchTbq5TbXJJ16u19uLTa",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmbLHAnMoJPWSCR5Zhtx6BHJX9KiKNN6tpvbUcqanj75Nb",
    "/dnsaddr/bootstrap.libp2p.io/p2p/QmcZf59bWwK5XFi76CZX8cbJ4BhTzzA3gU1ZjYZcYW3dwt",
    "/ip4/104.131.131.82/tcp/4001/p2p/QmaCpDMGvV2BGHeYERUEnRQAwe3N8SzbUtfsmvsqQLuvuJ",
];

// =============================================================================
// Protocol Identification
// =============================================================================

/// Default rendezvous tag advertised and searched on the DHT.
pub const DEFAULT_RENDEZVOUS: &str = "meet me here";

/// Default chat stream protocol.
pub const DEFAULT_CHAT_PROTOCOL: &str = "/chat/1.1.0";

/// Default Kademlia protocol (the public IPFS DHT).
pub const DEFAULT_KAD_PROTOCOL: &str = "/ipfs/kad/1.0.0";

/// Protocol version string for identify protocol.
pub const PROTOCOL_VERSION: &str = "/tryst/1.0.0";

// =============================================================================
// Network Timeouts & Intervals
// =============================================================================

/// Default connection idle timeout in seconds.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 60;

/// How long to wait for the first listen address before giving up.
pub const DEFAULT_LISTEN_TIMEOUT_SECS: u64 = 5;

/// Default ping interval in seconds.
pub const DEFAULT_PING_INTERVAL_SECS: u64 = 15;

// =============================================================================
// Discovery
// =============================================================================

/// Pause between discovery iterations.
pub const DEFAULT_DISCOVERY_INTERVAL_SECS: u64 = 5;

/// Pause before the first discovery iteration, letting the DHT bootstrap settle.
pub const DEFAULT_DISCOVERY_INITIAL_DELAY_SECS: u64 = 1;

/// Minimum time between two provider publications for the same tag.
pub const DEFAULT_READVERTISE_INTERVAL_SECS: u64 = 600;

// =============================================================================
// Lifecycle
// =============================================================================

/// How long to wait for tasks to drain after the shutdown signal fires.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;
