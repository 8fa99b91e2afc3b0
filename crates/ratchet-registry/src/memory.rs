//! In-process registry used by tests, simulations, and dry runs

use crate::error::RegistryError;
use crate::registry::{RunFilter, RunRegistry};
use crate::run::{ArtifactRecord, HistoryStep, MetricMap, Run, RunId, RunState};
use async_trait::async_trait;
use dashmap::DashMap;

/// Tag recorded when cancellation is requested
pub const CANCEL_TAG: &str = "cancel-requested";

/// [`RunRegistry`] backed by in-process maps
///
/// Seeding methods are synchronous so fixtures can be built without a
/// runtime. The async trait surface behaves like the real service:
/// newest-first listings, idempotent tag writes, advisory cancel.
#[derive(Debug, Default)]
pub struct MemoryRegistry {
    runs: DashMap<RunId, Run>,
    history: DashMap<RunId, Vec<HistoryStep>>,
    logs: DashMap<RunId, Vec<String>>,
    artifacts: DashMap<RunId, Vec<ArtifactRecord>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a run record
    pub fn insert_run(&self, run: Run) {
        self.runs.insert(run.id.clone(), run);
    }

    /// Move a run to a new state, stamping `finished_at` on terminal states
    pub fn set_state(&self, id: &RunId, state: RunState) -> Result<(), RegistryError> {
        let mut run = self
            .runs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))?;
        run.state = state;
        if state.is_terminal() && run.finished_at.is_none() {
            run.finished_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    /// Replace a run's summary metrics
    pub fn set_summary(&self, id: &RunId, summary: MetricMap) -> Result<(), RegistryError> {
        let mut run = self
            .runs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))?;
        run.summary = summary;
        Ok(())
    }

    /// Append a history step
    pub fn push_history(&self, id: &RunId, step: HistoryStep) {
        self.history.entry(id.clone()).or_default().push(step);
    }

    /// Append lines to the run's captured output
    pub fn append_log(&self, id: &RunId, lines: &[&str]) {
        self.logs
            .entry(id.clone())
            .or_default()
            .extend(lines.iter().map(|l| (*l).to_string()));
    }

    /// Record an artifact against the run
    pub fn add_artifact(&self, id: &RunId, artifact: ArtifactRecord) {
        self.artifacts.entry(id.clone()).or_default().push(artifact);
    }

    /// Number of runs currently held
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// Whether the registry holds no runs
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }
}

#[async_trait]
impl RunRegistry for MemoryRegistry {
    async fn get_run(&self, id: &RunId) -> Result<Run, RegistryError> {
        self.runs
            .get(id)
            .map(|r| r.clone())
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))
    }

    async fn latest_run_for_branch(&self, branch: &str) -> Result<Option<Run>, RegistryError> {
        let mut matching: Vec<Run> = self
            .runs
            .iter()
            .filter(|r| r.on_branch(branch))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(matching.into_iter().next())
    }

    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, RegistryError> {
        let mut matching: Vec<Run> = self
            .runs
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.clone())
            .collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        if let Some(limit) = filter.limit {
            matching.truncate(limit);
        }
        Ok(matching)
    }

    async fn get_history(&self, id: &RunId) -> Result<Vec<HistoryStep>, RegistryError> {
        if !self.runs.contains_key(id) {
            return Err(RegistryError::NotFound(format!("run {id}")));
        }
        let mut steps = self.history.get(id).map(|h| h.clone()).unwrap_or_default();
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    async fn set_tag(&self, id: &RunId, tag: &str) -> Result<(), RegistryError> {
        let mut run = self
            .runs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))?;
        if !run.tags.iter().any(|t| t == tag) {
            run.tags.push(tag.to_string());
        }
        Ok(())
    }

    async fn remove_tag(&self, id: &RunId, tag: &str) -> Result<(), RegistryError> {
        let mut run = self
            .runs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))?;
        run.tags.retain(|t| t != tag);
        Ok(())
    }

    async fn add_note(&self, id: &RunId, note: &str, append: bool) -> Result<(), RegistryError> {
        let mut run = self
            .runs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))?;
        run.notes = match (append, run.notes.take()) {
            (true, Some(existing)) => Some(format!("{existing}\n{note}")),
            _ => Some(note.to_string()),
        };
        Ok(())
    }

    async fn cancel(&self, id: &RunId) -> Result<bool, RegistryError> {
        let mut run = self
            .runs
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))?;
        if run.state.is_terminal() {
            return Ok(false);
        }
        run.state = RunState::Cancelled;
        run.finished_at = Some(chrono::Utc::now());
        if !run.tags.iter().any(|t| t == CANCEL_TAG) {
            run.tags.push(CANCEL_TAG.to_string());
        }
        Ok(true)
    }

    async fn delete(&self, id: &RunId, delete_artifacts: bool) -> Result<(), RegistryError> {
        if self.runs.remove(id).is_none() {
            return Err(RegistryError::NotFound(format!("run {id}")));
        }
        self.history.remove(id);
        self.logs.remove(id);
        if delete_artifacts {
            self.artifacts.remove(id);
        }
        Ok(())
    }

    async fn log_tail(&self, id: &RunId, max_lines: usize) -> Result<Vec<String>, RegistryError> {
        if !self.runs.contains_key(id) {
            return Err(RegistryError::NotFound(format!("run {id}")));
        }
        let lines = self.logs.get(id).map(|l| l.clone()).unwrap_or_default();
        let start = lines.len().saturating_sub(max_lines);
        Ok(lines[start..].to_vec())
    }

    async fn list_artifacts(&self, id: &RunId) -> Result<Vec<ArtifactRecord>, RegistryError> {
        if !self.runs.contains_key(id) {
            return Err(RegistryError::NotFound(format!("run {id}")));
        }
        Ok(self.artifacts.get(id).map(|a| a.clone()).unwrap_or_default())
    }
}
