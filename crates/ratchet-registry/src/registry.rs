//! The registry trait every tracking-service backend implements

use crate::error::RegistryError;
use crate::run::{ArtifactRecord, HistoryStep, Run, RunId, RunState};
use async_trait::async_trait;

/// Filter for listing runs
#[derive(Debug, Clone, Default)]
pub struct RunFilter {
    /// Keep only runs in these states
    pub states: Option<Vec<RunState>>,
    /// Keep only runs launched from this branch
    pub branch: Option<String>,
    /// Keep only runs carrying this tag
    pub tag: Option<String>,
    /// Stop after this many runs (newest first)
    pub limit: Option<usize>,
}

impl RunFilter {
    /// Create an empty filter (matches everything)
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only runs in the given states
    #[inline]
    #[must_use]
    pub fn with_states(mut self, states: Vec<RunState>) -> Self {
        self.states = Some(states);
        self
    }

    /// Keep only runs launched from the given branch
    #[inline]
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Keep only runs carrying the given tag
    #[inline]
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Stop after this many runs
    #[inline]
    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether a run passes this filter
    #[must_use]
    pub fn matches(&self, run: &Run) -> bool {
        if let Some(states) = &self.states {
            if !states.contains(&run.state) {
                return false;
            }
        }
        if let Some(branch) = &self.branch {
            if !run.on_branch(branch) {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !run.tags.iter().any(|t| t == tag) {
                return false;
            }
        }
        true
    }
}

/// Read and mutate runs held by a tracking service
///
/// Runs are immutable once terminal except for tags and notes. Tag writes
/// are idempotent. Cancellation is advisory: the service decides when the
/// run actually stops.
#[async_trait]
pub trait RunRegistry: Send + Sync {
    /// Fetch a single run by id
    async fn get_run(&self, id: &RunId) -> Result<Run, RegistryError>;

    /// Newest run launched from the given branch, if any
    async fn latest_run_for_branch(&self, branch: &str) -> Result<Option<Run>, RegistryError>;

    /// List runs matching the filter, newest first
    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, RegistryError>;

    /// Full step-by-step metric history for a run, ascending by step
    async fn get_history(&self, id: &RunId) -> Result<Vec<HistoryStep>, RegistryError>;

    /// Apply a tag; applying an existing tag is a no-op
    async fn set_tag(&self, id: &RunId, tag: &str) -> Result<(), RegistryError>;

    /// Remove a tag; removing an absent tag is a no-op
    async fn remove_tag(&self, id: &RunId, tag: &str) -> Result<(), RegistryError>;

    /// Set or append to the run's notes
    async fn add_note(&self, id: &RunId, note: &str, append: bool) -> Result<(), RegistryError>;

    /// Request cancellation; returns false when the run was already terminal
    async fn cancel(&self, id: &RunId) -> Result<bool, RegistryError>;

    /// Delete a run record, optionally with its artifacts
    async fn delete(&self, id: &RunId, delete_artifacts: bool) -> Result<(), RegistryError>;

    /// Last `max_lines` lines of the run's captured output
    async fn log_tail(&self, id: &RunId, max_lines: usize) -> Result<Vec<String>, RegistryError>;

    /// Artifacts logged against the run
    async fn list_artifacts(&self, id: &RunId) -> Result<Vec<ArtifactRecord>, RegistryError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::Run;

    #[test]
    fn filter_matches_states_and_branch() {
        let run = Run::new("r1", "tune-adamw-deadbeef")
            .with_branch("tune-adamw")
            .with_state(RunState::Finished);

        let by_state = RunFilter::new().with_states(vec![RunState::Finished]);
        assert!(by_state.matches(&run));

        let by_branch = RunFilter::new().with_branch("tune-adamw");
        assert!(by_branch.matches(&run));

        let wrong_branch = RunFilter::new().with_branch("other");
        assert!(!wrong_branch.matches(&run));

        let by_tag = RunFilter::new().with_tag("keep");
        assert!(!by_tag.matches(&run));
    }
}
