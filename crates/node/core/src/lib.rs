//! Node infrastructure for tryst.
//!
//! - [`args`] - CLI argument structs
//! - [`config`] - Figment configuration loading
//! - [`constants`] - Protocol and timing defaults
//! - [`logging`] - Logging initialization
//! - [`metrics`] - Prometheus endpoint
//! - [`version`] - Version information
//!
//! For node launch, see `tryst-node-builder`.

pub mod args;
pub mod config;
pub mod constants;
pub mod logging;
pub mod metrics;
pub mod version;
