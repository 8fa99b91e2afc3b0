//! Read-only registry over an exported project snapshot
//!
//! A snapshot is a JSON export of run records (with optional history, logs,
//! and artifacts) so comparisons and reports can be produced offline. Write
//! operations fail with [`RegistryError::ReadOnly`].

use crate::error::RegistryError;
use crate::registry::{RunFilter, RunRegistry};
use crate::run::{ArtifactRecord, HistoryStep, Run, RunId};
use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Exported project state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// Project the runs belong to
    pub project: String,
    /// When the export was taken
    pub exported_at: Option<chrono::DateTime<chrono::Utc>>,
    /// Exported run records
    pub runs: Vec<Run>,
    /// Per-run metric history, keyed by run id
    #[serde(default)]
    pub history: IndexMap<String, Vec<HistoryStep>>,
    /// Per-run captured output, keyed by run id
    #[serde(default)]
    pub logs: IndexMap<String, Vec<String>>,
    /// Per-run artifacts, keyed by run id
    #[serde(default)]
    pub artifacts: IndexMap<String, Vec<ArtifactRecord>>,
}

impl Snapshot {
    /// Parse a snapshot from JSON text
    pub fn from_json(text: &str) -> Result<Self, RegistryError> {
        serde_json::from_str(text).map_err(|e| RegistryError::Malformed(e.to_string()))
    }

    /// Serialize the snapshot to pretty JSON
    pub fn to_json(&self) -> Result<String, RegistryError> {
        serde_json::to_string_pretty(self).map_err(|e| RegistryError::Malformed(e.to_string()))
    }
}

/// [`RunRegistry`] backed by a [`Snapshot`] file
#[derive(Debug)]
pub struct SnapshotRegistry {
    snapshot: Snapshot,
}

impl SnapshotRegistry {
    /// Wrap an already-parsed snapshot
    #[inline]
    #[must_use]
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Load a snapshot file from disk
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| RegistryError::NotFound(format!("snapshot {}: {e}", path.display())))?;
        Ok(Self::new(Snapshot::from_json(&text)?))
    }

    /// Project the snapshot was exported from
    #[inline]
    #[must_use]
    pub fn project(&self) -> &str {
        &self.snapshot.project
    }

    fn read_only<T>(what: &str) -> Result<T, RegistryError> {
        Err(RegistryError::ReadOnly(format!(
            "{what} is not available on a snapshot"
        )))
    }
}

#[async_trait]
impl RunRegistry for SnapshotRegistry {
    async fn get_run(&self, id: &RunId) -> Result<Run, RegistryError> {
        self.snapshot
            .runs
            .iter()
            .find(|r| &r.id == id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(format!("run {id}")))
    }

    async fn latest_run_for_branch(&self, branch: &str) -> Result<Option<Run>, RegistryError> {
        let mut matching: Vec<Run> = self
            .snapshot
            .runs
            .iter()
            .filter(|r| r.on_branch(branch))
            .cloned()
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
            .snapshot
            .runs
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
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
        let mut steps = self
            .snapshot
            .history
            .get(id.as_str())
            .cloned()
            .unwrap_or_default();
        steps.sort_by_key(|s| s.step);
        Ok(steps)
    }

    async fn set_tag(&self, _id: &RunId, _tag: &str) -> Result<(), RegistryError> {
        Self::read_only("set_tag")
    }

    async fn remove_tag(&self, _id: &RunId, _tag: &str) -> Result<(), RegistryError> {
        Self::read_only("remove_tag")
    }

    async fn add_note(&self, _id: &RunId, _note: &str, _append: bool) -> Result<(), RegistryError> {
        Self::read_only("add_note")
    }

    async fn cancel(&self, _id: &RunId) -> Result<bool, RegistryError> {
        Self::read_only("cancel")
    }

    async fn delete(&self, _id: &RunId, _delete_artifacts: bool) -> Result<(), RegistryError> {
        Self::read_only("delete")
    }

    async fn log_tail(&self, id: &RunId, max_lines: usize) -> Result<Vec<String>, RegistryError> {
        let lines = self
            .snapshot
            .logs
            .get(id.as_str())
            .cloned()
            .unwrap_or_default();
        let start = lines.len().saturating_sub(max_lines);
        Ok(lines[start..].to_vec())
    }

    async fn list_artifacts(&self, id: &RunId) -> Result<Vec<ArtifactRecord>, RegistryError> {
        Ok(self
            .snapshot
            .artifacts
            .get(id.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run::RunState;
    use std::io::Write;

    fn sample_snapshot() -> Snapshot {
        Snapshot {
            project: "lm-pretrain".to_string(),
            exported_at: Some(chrono::Utc::now()),
            runs: vec![
                Run::new("r1", "tune-lr-aaaa1111")
                    .with_branch("tune-lr")
                    .with_state(RunState::Finished)
                    .with_metric("loss", 0.42),
                Run::new("r2", "wider-ffn-bbbb2222")
                    .with_branch("wider-ffn")
                    .with_state(RunState::Crashed),
            ],
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn round_trips_through_file() {
        let snapshot = sample_snapshot();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(snapshot.to_json().unwrap().as_bytes())
            .unwrap();

        let registry = SnapshotRegistry::load(file.path()).unwrap();
        assert_eq!(registry.project(), "lm-pretrain");
        let run = registry.get_run(&RunId::from("r1")).await.unwrap();
        assert_eq!(run.summary["loss"], 0.42);
    }

    #[tokio::test]
    async fn writes_are_rejected() {
        let registry = SnapshotRegistry::new(sample_snapshot());
        let err = registry
            .set_tag(&RunId::from("r1"), "keep")
            .await
            .unwrap_err();
        assert!(matches!(err, RegistryError::ReadOnly(_)));
        let err = registry.cancel(&RunId::from("r2")).await.unwrap_err();
        assert!(matches!(err, RegistryError::ReadOnly(_)));
    }

    #[test]
    fn malformed_snapshot_is_reported() {
        let err = Snapshot::from_json("{ not json").unwrap_err();
        assert!(matches!(err, RegistryError::Malformed(_)));
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = SnapshotRegistry::load(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, RegistryError::NotFound(_)));
    }
}
