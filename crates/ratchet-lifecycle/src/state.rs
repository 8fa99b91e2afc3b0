//! Branch states and the transition table

use ratchet_registry::RunState;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an experiment branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BranchState {
    /// Idea filed, not yet picked up
    Proposed,
    /// Code being written on the branch
    Implementing,
    /// Run submitted to the queue
    Launched,
    /// Run picked up and training
    Running,
    /// Run completed normally
    Finished,
    /// Run raised an error
    Failed,
    /// Run died without reporting
    Crashed,
    /// Run stopped on request
    Cancelled,
    /// Comparison against the baseline computed
    Evaluated,
    /// Selected, awaiting the quality gate
    WinnerPendingReview,
    /// Out of contention
    Loser,
    /// Landed on the trunk
    Merged,
    /// Review closed without merging
    Closed,
    /// Retired from the active board
    Archived,
}

impl BranchState {
    /// Kebab-case label used in tables and audit records
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Proposed => "proposed",
            Self::Implementing => "implementing",
            Self::Launched => "launched",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Crashed => "crashed",
            Self::Cancelled => "cancelled",
            Self::Evaluated => "evaluated",
            Self::WinnerPendingReview => "winner-pending-review",
            Self::Loser => "loser",
            Self::Merged => "merged",
            Self::Closed => "closed",
            Self::Archived => "archived",
        }
    }

    /// Whether this state releases the batch readiness gate
    ///
    /// A batch reconciles only once every member is evaluated or out of
    /// contention.
    #[inline]
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Evaluated | Self::Loser | Self::Closed)
    }

    /// Whether no further transitions exist from this state
    #[inline]
    #[must_use]
    pub fn is_final(&self) -> bool {
        allowed_transitions(*self).is_empty()
    }

    /// Branch state mirroring a run state observation
    #[must_use]
    pub fn from_run_state(state: RunState) -> Self {
        match state {
            RunState::Queued => Self::Launched,
            RunState::Running => Self::Running,
            RunState::Finished => Self::Finished,
            RunState::Failed => Self::Failed,
            RunState::Crashed => Self::Crashed,
            RunState::Cancelled => Self::Cancelled,
        }
    }
}

impl std::fmt::Display for BranchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A transition the table does not allow
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal transition: {from} -> {to}")]
pub struct InvalidTransition {
    /// State the branch was in
    pub from: BranchState,
    /// State that was requested
    pub to: BranchState,
}

/// Validate a state transition
///
/// Surprising observations (a run that failed after being marked finished)
/// must fail loudly rather than be silently coerced.
pub fn validate_transition(from: BranchState, to: BranchState) -> Result<(), InvalidTransition> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(InvalidTransition { from, to })
    }
}

/// States reachable in one step
#[must_use]
pub fn allowed_transitions(from: BranchState) -> Vec<BranchState> {
    use BranchState::*;
    match from {
        Proposed => vec![Implementing],
        Implementing => vec![Launched],
        // The first observation after a queue poll may already be terminal.
        Launched => vec![Running, Finished, Failed, Crashed, Cancelled],
        Running => vec![Finished, Failed, Crashed, Cancelled],
        Finished => vec![Evaluated],
        Failed => vec![Implementing, Loser],
        Crashed => vec![Implementing, Loser],
        Cancelled => vec![Loser, Closed],
        Evaluated => vec![WinnerPendingReview, Loser],
        WinnerPendingReview => vec![Merged, Implementing, Loser, Closed],
        Loser => vec![Closed],
        Merged => vec![Archived],
        Closed => vec![Archived],
        Archived => vec![],
    }
}

fn allowed(from: BranchState, to: BranchState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_legal() {
        use BranchState::*;
        let path = [
            Proposed,
            Implementing,
            Launched,
            Running,
            Finished,
            Evaluated,
            WinnerPendingReview,
            Merged,
            Archived,
        ];
        for pair in path.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok());
        }
    }

    #[test]
    fn fix_loop_is_legal() {
        use BranchState::*;
        assert!(validate_transition(Failed, Implementing).is_ok());
        assert!(validate_transition(Crashed, Implementing).is_ok());
        assert!(validate_transition(Failed, Loser).is_ok());
    }

    #[test]
    fn launched_may_jump_to_terminal() {
        use BranchState::*;
        assert!(validate_transition(Launched, Crashed).is_ok());
        assert!(validate_transition(Launched, Finished).is_ok());
    }

    #[test]
    fn surprising_observations_fail_loudly() {
        use BranchState::*;
        let err = validate_transition(Finished, Failed).unwrap_err();
        assert_eq!(err.from, Finished);
        assert_eq!(err.to, Failed);
        assert!(validate_transition(Merged, Loser).is_err());
        assert!(validate_transition(Archived, Proposed).is_err());
    }

    #[test]
    fn settled_states_release_the_gate() {
        use BranchState::*;
        assert!(Evaluated.is_settled());
        assert!(Loser.is_settled());
        assert!(Closed.is_settled());
        assert!(!Running.is_settled());
        assert!(!WinnerPendingReview.is_settled());
    }

    #[test]
    fn archived_is_final() {
        assert!(BranchState::Archived.is_final());
        assert!(!BranchState::Merged.is_final());
    }
}
