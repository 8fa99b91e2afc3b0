//! Ratchet Registry - tracking-service adapter
//!
//! Everything the workspace knows about runs comes through here:
//! - Run records, states, summaries, configs, history, artifacts
//! - The [`RunRegistry`] trait implemented per backend
//! - Bounded-backoff retry for transient service failures
//! - The [`LaunchQueue`] surface for submitting branch runs
//!
//! # Example
//!
//! ```rust,ignore
//! use ratchet_registry::{MemoryRegistry, RetryingRegistry, RunRegistry, RunFilter};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let registry = RetryingRegistry::new(MemoryRegistry::new());
//! let finished = registry.list_runs(&RunFilter::new()).await?;
//! println!("{} runs", finished.len());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod error;
pub mod launch;
pub mod memory;
pub mod registry;
pub mod retry;
pub mod run;
pub mod snapshot;

// Re-exports for convenience
pub use error::{QueueError, RegistryError};
pub use launch::{LaunchQueue, LaunchRequest, MemoryQueue, Priority, QueuedRun};
pub use memory::{MemoryRegistry, CANCEL_TAG};
pub use registry::{RunFilter, RunRegistry};
pub use retry::{Backoff, RetryingRegistry};
pub use run::{
    sanitize_summary, ArtifactRecord, ConfigMap, ConfigValue, HistoryStep, MetricMap, Run, RunId,
    RunState, UnsupportedConfigValue,
};
pub use snapshot::{Snapshot, SnapshotRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
