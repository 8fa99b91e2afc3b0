//! The coding seat: turns ideas and diagnoses into commits
//!
//! The orchestrator never writes code itself. It hands an idea (or a
//! failure [`Diagnosis`]) to a [`Workbench`] and gets back the commit
//! that should be launched. Production deployments plug in an agentic
//! coder or a human-in-the-loop queue; tests use [`MemoryWorkbench`].

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use ratchet_forge::CommitId;
use ratchet_registry::RunId;
use thiserror::Error;
use tracing::info;

use crate::diagnose::Diagnosis;

/// Errors from the coding seat
#[derive(Error, Debug)]
pub enum WorkbenchError {
    /// The idea could not be turned into a working change
    #[error("implementation failed on branch '{branch}': {detail}")]
    Implementation {
        /// Branch the change was meant for
        branch: String,
        /// What went wrong
        detail: String,
    },

    /// A fix attempt did not produce a new commit
    #[error("fix failed on branch '{branch}': {detail}")]
    Fix {
        /// Branch the fix was meant for
        branch: String,
        /// What went wrong
        detail: String,
    },
}

/// Where code changes come from.
///
/// Both operations return the head commit of the branch after the
/// change lands, ready to be submitted to the launch queue.
#[async_trait]
pub trait Workbench: Send + Sync {
    /// Implement `idea` on `branch` and return the resulting commit.
    async fn implement(&self, branch: &str, idea: &str) -> Result<CommitId, WorkbenchError>;

    /// Patch `branch` based on a failure diagnosis and return the new
    /// commit. Called once per fix attempt, so implementations may use
    /// the diagnosis to avoid repeating a change that already failed.
    async fn apply_fix(&self, branch: &str, diagnosis: &Diagnosis)
        -> Result<CommitId, WorkbenchError>;
}

/// In-memory [`Workbench`] that mints commits without writing code.
///
/// Records every call so tests can assert what the orchestrator asked
/// for.
pub struct MemoryWorkbench {
    next_commit: AtomicU64,
    implemented: Mutex<Vec<(String, String)>>,
    fixes: Mutex<Vec<(String, RunId)>>,
}

impl MemoryWorkbench {
    /// Create an empty workbench
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_commit: AtomicU64::new(1),
            implemented: Mutex::new(Vec::new()),
            fixes: Mutex::new(Vec::new()),
        }
    }

    fn mint_commit(&self) -> CommitId {
        let n = self.next_commit.fetch_add(1, Ordering::SeqCst);
        CommitId(format!("c{n:06}"))
    }

    /// `(branch, idea)` pairs passed to [`Workbench::implement`]
    #[must_use]
    pub fn implemented(&self) -> Vec<(String, String)> {
        self.implemented.lock().clone()
    }

    /// `(branch, diagnosed run)` pairs passed to [`Workbench::apply_fix`]
    #[must_use]
    pub fn fixes(&self) -> Vec<(String, RunId)> {
        self.fixes.lock().clone()
    }
}

impl Default for MemoryWorkbench {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Workbench for MemoryWorkbench {
    async fn implement(&self, branch: &str, idea: &str) -> Result<CommitId, WorkbenchError> {
        let commit = self.mint_commit();
        info!(branch, commit = %commit, "implemented idea");
        self.implemented
            .lock()
            .push((branch.to_string(), idea.to_string()));
        Ok(commit)
    }

    async fn apply_fix(
        &self,
        branch: &str,
        diagnosis: &Diagnosis,
    ) -> Result<CommitId, WorkbenchError> {
        let commit = self.mint_commit();
        info!(branch, run = %diagnosis.run, commit = %commit, "applied fix");
        self.fixes
            .lock()
            .push((branch.to_string(), diagnosis.run.clone()));
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_registry::RunState;

    #[tokio::test]
    async fn workbench_mints_distinct_commits_and_records_calls() {
        let bench = MemoryWorkbench::new();
        let first = bench.implement("tune-lr", "halve the lr").await.unwrap();
        let second = bench.implement("wider-ffn", "widen ffn").await.unwrap();
        assert_ne!(first, second);

        let diagnosis = Diagnosis {
            run: RunId::from("r-1"),
            state: RunState::Crashed,
            log_tail: Vec::new(),
            config: Default::default(),
            last_steps: Vec::new(),
            error_lines: Vec::new(),
        };
        let fixed = bench.apply_fix("tune-lr", &diagnosis).await.unwrap();
        assert_ne!(fixed, second);

        assert_eq!(bench.implemented().len(), 2);
        assert_eq!(bench.fixes(), vec![("tune-lr".to_string(), RunId::from("r-1"))]);
    }
}
