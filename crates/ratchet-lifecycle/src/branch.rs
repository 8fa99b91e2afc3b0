//! Branch and baseline entities

use crate::state::{validate_transition, BranchState, InvalidTransition};
use ratchet_registry::{MetricMap, RunId};
use ratchet_verdict::Verdict;
use serde::{Deserialize, Serialize};

/// An experiment branch tracked on the board
///
/// A branch holds at most one active run. Relaunching supersedes the old
/// run id rather than duplicating lineage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Branch {
    /// Branch name (unique on the board)
    pub name: String,
    /// Issue reference for the originating idea
    pub idea: Option<String>,
    /// Current lifecycle state
    pub state: BranchState,
    /// Standing relative to the baseline
    pub verdict: Verdict,
    /// Active run, if one has been launched
    pub run: Option<RunId>,
    /// Run ids replaced by relaunches, oldest first
    pub superseded_runs: Vec<RunId>,
    /// Review request number, once opened
    pub review: Option<u64>,
    /// Diagnose-and-fix attempts consumed
    pub fix_attempts: u32,
    /// When the branch was registered
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Last state change
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl Branch {
    /// Register a branch in the proposed state
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = chrono::Utc::now();
        Self {
            name: name.into(),
            idea: None,
            state: BranchState::Proposed,
            verdict: Verdict::Unevaluated,
            run: None,
            superseded_runs: Vec::new(),
            review: None,
            fix_attempts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// With the originating issue
    #[inline]
    #[must_use]
    pub fn with_idea(mut self, issue: impl Into<String>) -> Self {
        self.idea = Some(issue.into());
        self
    }

    /// With an initial state (fixtures)
    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: BranchState) -> Self {
        self.state = state;
        self
    }

    /// Move to a new state if the table allows it
    pub fn advance(&mut self, to: BranchState) -> Result<BranchState, InvalidTransition> {
        validate_transition(self.state, to)?;
        let from = self.state;
        self.state = to;
        self.updated_at = chrono::Utc::now();
        Ok(from)
    }

    /// Attach a run, superseding any previous one
    pub fn record_run(&mut self, run: RunId) {
        if let Some(old) = self.run.replace(run) {
            self.superseded_runs.push(old);
        }
        self.updated_at = chrono::Utc::now();
    }

    /// Count one fix attempt, returning the new total
    pub fn begin_fix(&mut self) -> u32 {
        self.fix_attempts += 1;
        self.updated_at = chrono::Utc::now();
        self.fix_attempts
    }

    /// Set the standing verdict
    pub fn set_verdict(&mut self, verdict: Verdict) {
        self.verdict = verdict;
        self.updated_at = chrono::Utc::now();
    }
}

/// The designated best-known-good trunk run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Baseline {
    /// Run the baseline numbers come from
    pub run_id: RunId,
    /// Trunk branch name
    pub branch: String,
    /// Trunk commit the run was launched from
    pub commit: String,
    /// Summary metrics every candidate is compared against
    pub summary: MetricMap,
    /// When this baseline took effect
    pub established_at: chrono::DateTime<chrono::Utc>,
}

impl Baseline {
    /// Establish a baseline from a trunk run
    #[must_use]
    pub fn new(
        run_id: impl Into<RunId>,
        branch: impl Into<String>,
        commit: impl Into<String>,
        summary: MetricMap,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            branch: branch.into(),
            commit: commit.into(),
            summary,
            established_at: chrono::Utc::now(),
        }
    }
}
