//! Ratchet Lifecycle - branch state machine and board
//!
//! Tracks every experiment branch from proposal to archive:
//! - [`BranchState`] and the closed transition table
//! - [`Branch`] and [`Baseline`] entities
//! - [`Batch`] grouping plus the reconciliation readiness gate
//! - [`Board`], the single place branch state lives
//! - [`TransitionLog`], a hash-chained audit trail with reasons
//!
//! Transitions that the table does not allow fail loudly; nothing is
//! coerced. Every accepted move is chained into the audit log.

#![warn(unreachable_pub)]
#![allow(missing_docs)]

// Core modules
pub mod audit;
pub mod batch;
pub mod board;
pub mod branch;
pub mod state;

// Re-exports for convenience
pub use audit::{AuditError, EventId, TransitionEvent, TransitionLog};
pub use batch::{Batch, BatchId, GateStatus};
pub use board::{Board, BoardError};
pub use branch::{Baseline, Branch};
pub use state::{allowed_transitions, validate_transition, BranchState, InvalidTransition};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
