//! Ratchet core - the experiment orchestrator
//!
//! Wires the tracking registry, code host, launch queue and workbench
//! together and drives experiment branches around the lifecycle:
//! - accepts ideas into a batch and launches them
//! - polls runs, diagnosing and relaunching failures under a fix budget
//! - reconciles the settled batch and merges the winners
//! - adopts fresh baselines and reports regressions
//!
//! # Example
//!
//! ```rust,ignore
//! use ratchet_core::{MemoryWorkbench, Orchestrator, OrchestratorConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = Orchestrator::with_defaults(
//!     OrchestratorConfig::default(),
//!     registry,
//!     forge,
//!     queue,
//!     std::sync::Arc::new(MemoryWorkbench::new()),
//! );
//!
//! orchestrator.establish_baseline("r-baseline").await?;
//! orchestrator.open_batch()?;
//! orchestrator.accept_idea("tune-lr", "halve the learning rate")?;
//! orchestrator.launch("tune-lr").await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod config;
pub mod diagnose;
pub mod error;
pub mod orchestrator;
pub mod workbench;

// Re-exports for convenience
pub use config::{
    OrchestratorConfig, ENV_ENTITY, ENV_PROJECT, ENV_QUEUE, ENV_TRUNK,
};
pub use diagnose::{diagnose, Diagnosis, DEFAULT_LAST_STEPS, DEFAULT_LOG_LINES};
pub use error::OrchestratorError;
pub use orchestrator::{BaselineAdoption, Orchestrator, PollAction, PollReport};
pub use workbench::{MemoryWorkbench, Workbench, WorkbenchError};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
