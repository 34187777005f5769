//! Type-state node builder for Tryst.
//!
//! # Example
//!
//! ```ignore
//! use tryst_node_builder::NodeBuilder;
//! use tryst_tasks::TaskManager;
//!
//! let mut manager = TaskManager::current();
//! let handle = NodeBuilder::new()
//!     .with_launch_context(manager.executor())
//!     .with_node(config, identity)
//!     .launch()
//!     .await?;
//!
//! let exit = manager.wait_for_exit().await;
//! ```

mod builder;
mod handle;

pub use builder::*;
pub use handle::*;
