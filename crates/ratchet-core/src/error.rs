//! Orchestrator error taxonomy

use ratchet_lifecycle::BranchState;
use ratchet_registry::{RunId, RunState};

use crate::workbench::WorkbenchError;

/// Errors from orchestrator operations
#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    /// No batch is open; establish a baseline and open one first
    #[error("no batch is open")]
    NoBatch,

    /// No baseline has been established yet
    #[error("no baseline established")]
    NoBaseline,

    /// The branch has no run to observe
    #[error("branch {0} has no run")]
    NoRun(String),

    /// The branch is not in a launchable state
    #[error("branch {branch} is {state}, not implementing")]
    NotLaunchable {
        /// Branch that was asked to launch
        branch: String,
        /// State it is actually in
        state: BranchState,
    },

    /// A run offered as baseline has not finished
    #[error("run {run} is {state}, only finished runs can baseline")]
    NotFinished {
        /// The offered run
        run: RunId,
        /// State it is in
        state: RunState,
    },

    /// The fresh baseline run ended without finishing
    #[error("baseline run {run} ended {state}")]
    BaselineRunLost {
        /// The submitted baseline run
        run: RunId,
        /// Terminal state it reached
        state: RunState,
    },

    /// The trunk writer is claimed elsewhere
    #[error(transparent)]
    TrunkBusy(#[from] ratchet_forge::WriterBusy),

    /// A board operation was rejected
    #[error(transparent)]
    Board(#[from] ratchet_lifecycle::BoardError),

    /// A tracking-service operation failed
    #[error(transparent)]
    Registry(#[from] ratchet_registry::RegistryError),

    /// The launch queue refused a submission
    #[error(transparent)]
    Queue(#[from] ratchet_registry::QueueError),

    /// A code-host operation failed
    #[error(transparent)]
    Forge(#[from] ratchet_forge::ForgeError),

    /// The workbench could not produce a commit
    #[error(transparent)]
    Workbench(#[from] WorkbenchError),

    /// Reconciliation halted or failed
    #[error(transparent)]
    Reconcile(#[from] ratchet_reconcile::ReconcileError),
}
