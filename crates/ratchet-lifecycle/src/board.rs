//! The board: every tracked branch and the audit trail of its moves

use crate::audit::{AuditError, TransitionEvent, TransitionLog};
use crate::batch::{Batch, GateStatus};
use crate::branch::Branch;
use crate::state::{BranchState, InvalidTransition};
use parking_lot::RwLock;
use ratchet_registry::RunId;
use ratchet_verdict::Verdict;
use std::collections::HashMap;
use tracing::{debug, info};

/// Errors from board operations
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    /// No branch registered under that name
    #[error("unknown branch: {0}")]
    UnknownBranch(String),

    /// A branch with that name already exists
    #[error("branch already registered: {0}")]
    DuplicateBranch(String),

    /// The transition table rejected the move
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
}

/// Registry of branches plus the hash-chained transition log
///
/// The single place branch state lives. Every state change goes through
/// [`Board::advance`] so it lands in the audit chain with its reason.
#[derive(Debug, Default)]
pub struct Board {
    branches: RwLock<HashMap<String, Branch>>,
    log: TransitionLog,
}

impl Board {
    /// Create an empty board
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new branch
    pub fn register(&self, branch: Branch) -> Result<(), BoardError> {
        let mut branches = self.branches.write();
        if branches.contains_key(&branch.name) {
            return Err(BoardError::DuplicateBranch(branch.name));
        }
        debug!(branch = %branch.name, state = %branch.state, "branch registered");
        branches.insert(branch.name.clone(), branch);
        Ok(())
    }

    /// Fetch a branch by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Branch> {
        self.branches.read().get(name).cloned()
    }

    /// Move a branch to a new state, recording the reason
    pub fn advance(
        &self,
        name: &str,
        to: BranchState,
        reason: &str,
    ) -> Result<BranchState, BoardError> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(name)
            .ok_or_else(|| BoardError::UnknownBranch(name.to_string()))?;
        let from = branch.advance(to)?;
        self.log.append(name, from, to, reason);
        info!(branch = %name, %from, %to, reason, "branch advanced");
        Ok(from)
    }

    /// Set a branch's verdict
    pub fn set_verdict(&self, name: &str, verdict: Verdict) -> Result<(), BoardError> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(name)
            .ok_or_else(|| BoardError::UnknownBranch(name.to_string()))?;
        branch.set_verdict(verdict);
        debug!(branch = %name, %verdict, "verdict set");
        Ok(())
    }

    /// Attach a run to a branch, superseding any previous run
    pub fn record_run(&self, name: &str, run: RunId) -> Result<(), BoardError> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(name)
            .ok_or_else(|| BoardError::UnknownBranch(name.to_string()))?;
        branch.record_run(run);
        Ok(())
    }

    /// Attach a review request to a branch
    pub fn set_review(&self, name: &str, review: u64) -> Result<(), BoardError> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(name)
            .ok_or_else(|| BoardError::UnknownBranch(name.to_string()))?;
        branch.review = Some(review);
        Ok(())
    }

    /// Count a fix attempt against a branch
    pub fn begin_fix(&self, name: &str) -> Result<u32, BoardError> {
        let mut branches = self.branches.write();
        let branch = branches
            .get_mut(name)
            .ok_or_else(|| BoardError::UnknownBranch(name.to_string()))?;
        Ok(branch.begin_fix())
    }

    /// Registered branch names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.branches.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// All branches, sorted by name
    #[must_use]
    pub fn snapshot(&self) -> Vec<Branch> {
        let mut all: Vec<Branch> = self.branches.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    /// Readiness of a batch's gate
    ///
    /// Unregistered members count as pending: a batch can never reconcile
    /// around a branch the board has lost sight of.
    #[must_use]
    pub fn gate_status(&self, batch: &Batch) -> GateStatus {
        let branches = self.branches.read();
        let pending: Vec<String> = batch
            .members
            .iter()
            .filter(|name| {
                branches
                    .get(*name)
                    .map_or(true, |b| !b.state.is_settled())
            })
            .cloned()
            .collect();
        GateStatus {
            ready: pending.is_empty(),
            pending,
        }
    }

    /// All audit events, in order
    #[must_use]
    pub fn audit_events(&self) -> Vec<TransitionEvent> {
        self.log.events()
    }

    /// Audit events for one branch
    #[must_use]
    pub fn audit_for(&self, branch: &str) -> Vec<TransitionEvent> {
        self.log.for_branch(branch)
    }

    /// Verify the audit chain end to end
    pub fn verify_audit(&self) -> Result<(), AuditError> {
        self.log.verify()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::Baseline;
    use ratchet_registry::MetricMap;

    fn board_with(names: &[&str]) -> Board {
        let board = Board::new();
        for name in names {
            board.register(Branch::new(*name)).unwrap();
        }
        board
    }

    #[test]
    fn duplicate_registration_rejected() {
        let board = board_with(&["tune-lr"]);
        let err = board.register(Branch::new("tune-lr")).unwrap_err();
        assert!(matches!(err, BoardError::DuplicateBranch(_)));
    }

    #[test]
    fn advance_records_audit_events() {
        let board = board_with(&["tune-lr"]);
        board
            .advance("tune-lr", BranchState::Implementing, "idea accepted")
            .unwrap();
        board
            .advance("tune-lr", BranchState::Launched, "run submitted")
            .unwrap();

        let events = board.audit_for("tune-lr");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].reason, "idea accepted");
        assert_eq!(events[1].from, BranchState::Implementing);
        board.verify_audit().unwrap();
    }

    #[test]
    fn illegal_moves_leave_no_trace() {
        let board = board_with(&["tune-lr"]);
        let err = board
            .advance("tune-lr", BranchState::Merged, "shortcut")
            .unwrap_err();
        assert!(matches!(err, BoardError::InvalidTransition(_)));
        assert!(board.audit_events().is_empty());
        assert_eq!(board.get("tune-lr").unwrap().state, BranchState::Proposed);
    }

    #[test]
    fn unknown_branch_is_reported() {
        let board = board_with(&[]);
        let err = board
            .advance("ghost", BranchState::Implementing, "x")
            .unwrap_err();
        assert!(matches!(err, BoardError::UnknownBranch(_)));
    }

    #[test]
    fn gate_waits_for_every_member() {
        let board = board_with(&["a", "b"]);
        let mut batch = Batch::new(Baseline::new("base", "main", "aaaa", MetricMap::new()));
        batch.add_member("a");
        batch.add_member("b");

        // a: Proposed -> ... -> Evaluated; b stays Proposed.
        for (to, reason) in [
            (BranchState::Implementing, "accepted"),
            (BranchState::Launched, "submitted"),
            (BranchState::Finished, "completed"),
            (BranchState::Evaluated, "compared"),
        ] {
            board.advance("a", to, reason).unwrap();
        }

        let status = board.gate_status(&batch);
        assert!(!status.ready);
        assert_eq!(status.pending, vec!["b".to_string()]);

        for (to, reason) in [
            (BranchState::Implementing, "accepted"),
            (BranchState::Launched, "submitted"),
            (BranchState::Cancelled, "preempted"),
            (BranchState::Loser, "discarded after cancel"),
        ] {
            board.advance("b", to, reason).unwrap();
        }

        let status = board.gate_status(&batch);
        assert!(status.ready);
        assert!(status.pending.is_empty());
    }

    #[test]
    fn gate_counts_unknown_members_as_pending() {
        let board = board_with(&[]);
        let mut batch = Batch::new(Baseline::new("base", "main", "aaaa", MetricMap::new()));
        batch.add_member("ghost");
        let status = board.gate_status(&batch);
        assert!(!status.ready);
        assert_eq!(status.pending, vec!["ghost".to_string()]);
    }
}
