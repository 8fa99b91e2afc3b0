//! Baseline reconciliation for settled experiment batches
//!
//! Once every branch in a batch has settled, the reconciler ranks the
//! survivors, runs the quality gate over the winners, merges the
//! cleared ones into the trunk one at a time, and relaunches the
//! baseline from the new trunk. A follow-up guard compares the fresh
//! baseline against the one it replaced and reports regressions;
//! rolling back is always a separate, explicit call.
//!
//! # Core Concepts
//!
//! - [`Reconciler`]: gate check, ranking, sequential merges, relaunch
//! - [`ReviewPass`] / [`Finding`]: the quality gate collaborator
//! - [`SmokeCheck`]: trunk validation between merges
//! - [`ConflictReport`]: where a halted merge sequence stands
//! - [`RegressionGuard`] / [`RegressionReport`]: post-reconcile check
//! - [`Rollback`] / [`BaselineHistory`]: explicit, history-preserving
//!   recovery

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod quality;
mod reconcile;
mod regression;
mod rollback;
mod smoke;

pub use error::{ConflictReport, ReconcileError};
pub use quality::{
    ApproveAll, Finding, OperatorDecision, ReviewPass, ReviewPassError, Severity,
};
pub use reconcile::{archive_settled, GateRecord, ReconcileOutcome, Reconciler};
pub use regression::{RegressionGuard, RegressionReport, Remedy};
pub use rollback::{BaselineHistory, Rollback, RollbackReceipt};
pub use smoke::{AlwaysHealthy, SmokeCheck, SmokeOutcome};
