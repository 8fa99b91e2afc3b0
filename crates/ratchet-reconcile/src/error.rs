//! Errors and the conflict report produced by a halted merge sequence

use ratchet_forge::MergeReceipt;
use serde::{Deserialize, Serialize};

use crate::quality::ReviewPassError;

/// Where a halted merge sequence stands.
///
/// Everything in `merged` is on the trunk and stays there; `branch` is
/// the one that conflicted; `remaining` never got attempted. Resolution
/// is explicit: rebase and reconcile again, or drop the branch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Branch whose merge conflicted
    pub branch: String,
    /// Conflicting paths reported by the host
    pub files: Vec<String>,
    /// Merges that landed before the halt, in order
    pub merged: Vec<MergeReceipt>,
    /// Cleared winners that were never attempted
    pub remaining: Vec<String>,
}

/// Errors from reconciliation
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The batch gate is not ready; nothing was touched
    #[error("batch not ready, waiting on: {}", pending.join(", "))]
    BatchNotReady {
        /// Members still unsettled
        pending: Vec<String>,
    },

    /// A merge conflicted and the sequence halted
    #[error("merge conflict on {}; {} merged before the halt", .0.branch, .0.merged.len())]
    Conflict(Box<ConflictReport>),

    /// The trunk failed validation right after a merge
    #[error("smoke check failed after merging {branch}: {detail}")]
    SmokeCheckFailed {
        /// Branch whose merge preceded the failure
        branch: String,
        /// What the check observed
        detail: String,
    },

    /// The review pass itself broke
    #[error(transparent)]
    ReviewPass(#[from] ReviewPassError),

    /// A board operation was rejected
    #[error(transparent)]
    Board(#[from] ratchet_lifecycle::BoardError),

    /// A code-host operation failed
    #[error(transparent)]
    Forge(#[from] ratchet_forge::ForgeError),

    /// A tracking-service operation failed
    #[error(transparent)]
    Registry(#[from] ratchet_registry::RegistryError),

    /// The launch queue rejected the fresh baseline run
    #[error(transparent)]
    Queue(#[from] ratchet_registry::QueueError),
}

impl ReconcileError {
    /// Whether this halt left merges on the trunk that need attention
    #[inline]
    #[must_use]
    pub fn is_partial(&self) -> bool {
        match self {
            Self::Conflict(report) => !report.merged.is_empty(),
            Self::SmokeCheckFailed { .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_ready_names_the_holdouts() {
        let err = ReconcileError::BatchNotReady {
            pending: vec!["tune-lr".into(), "wider-ffn".into()],
        };
        assert_eq!(
            err.to_string(),
            "batch not ready, waiting on: tune-lr, wider-ffn"
        );
        assert!(!err.is_partial());
    }

    #[test]
    fn conflict_with_prior_merges_is_partial() {
        let report = ConflictReport {
            branch: "wider-ffn".into(),
            files: vec!["train.py".into()],
            merged: vec![],
            remaining: vec![],
        };
        assert!(!ReconcileError::Conflict(Box::new(report)).is_partial());
    }
}
