//! Launch queue surface for submitting experiment runs

use crate::error::QueueError;
use crate::memory::MemoryRegistry;
use crate::run::{ConfigMap, ConfigValue, Run, RunId};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

/// Queue priority for a launch request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    /// Below normal
    Low,
    /// Default
    #[default]
    Normal,
    /// Ahead of normal
    High,
}

/// Request to launch one run from a branch head
///
/// `branch` and `commit` are always injected into the run config so results
/// can be traced back to the code that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchRequest {
    /// Experiment branch to launch from
    pub branch: String,
    /// Commit at the branch head
    pub commit: String,
    /// Training entry point
    pub entry_point: String,
    /// Config overrides applied on top of the branch defaults
    pub overrides: ConfigMap,
    /// Queue priority
    pub priority: Priority,
}

impl LaunchRequest {
    /// Create a request with the default entry point
    #[must_use]
    pub fn new(branch: impl Into<String>, commit: impl Into<String>) -> Self {
        Self {
            branch: branch.into(),
            commit: commit.into(),
            entry_point: "main.py".to_string(),
            overrides: ConfigMap::new(),
            priority: Priority::Normal,
        }
    }

    /// With an explicit entry point
    #[inline]
    #[must_use]
    pub fn with_entry_point(mut self, entry_point: impl Into<String>) -> Self {
        self.entry_point = entry_point.into();
        self
    }

    /// With a config override
    #[inline]
    #[must_use]
    pub fn with_override(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.overrides.insert(key.into(), value);
        self
    }

    /// With queue priority
    #[inline]
    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Run display name, `{branch}-{commit8}`
    #[must_use]
    pub fn run_name(&self) -> String {
        let short: String = self.commit.chars().take(8).collect();
        format!("{}-{}", self.branch, short)
    }

    /// Final run config: overrides plus the injected branch metadata
    #[must_use]
    pub fn run_config(&self) -> ConfigMap {
        let mut config = self.overrides.clone();
        config.insert("branch".to_string(), ConfigValue::Text(self.branch.clone()));
        config.insert("commit".to_string(), ConfigValue::Text(self.commit.clone()));
        config
    }
}

/// Receipt for a submitted launch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedRun {
    /// Run id assigned at submission
    pub run_id: RunId,
    /// Run display name
    pub name: String,
    /// Queue the request landed on
    pub queue: String,
}

/// Submit runs for execution on pooled compute
#[async_trait]
pub trait LaunchQueue: Send + Sync {
    /// Push a launch request; the run starts queued
    async fn submit(&self, request: LaunchRequest) -> Result<QueuedRun, QueueError>;
}

/// In-process queue that materializes queued runs in a [`MemoryRegistry`]
#[derive(Debug)]
pub struct MemoryQueue {
    queue: String,
    registry: Arc<MemoryRegistry>,
    submitted: Mutex<Vec<LaunchRequest>>,
    next_id: AtomicU64,
}

impl MemoryQueue {
    /// Create a queue writing into the given registry
    #[must_use]
    pub fn new(queue: impl Into<String>, registry: Arc<MemoryRegistry>) -> Self {
        Self {
            queue: queue.into(),
            registry,
            submitted: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Requests submitted so far, in order
    #[must_use]
    pub fn submitted(&self) -> Vec<LaunchRequest> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl LaunchQueue for MemoryQueue {
    async fn submit(&self, request: LaunchRequest) -> Result<QueuedRun, QueueError> {
        if request.branch.is_empty() {
            return Err(QueueError::Rejected("branch must not be empty".into()));
        }
        if request.commit.is_empty() {
            return Err(QueueError::Rejected("commit must not be empty".into()));
        }

        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let run_id = RunId(format!("run-{n:06}"));
        let name = request.run_name();

        let mut run = Run::new(run_id.clone(), name.clone())
            .with_branch(request.branch.clone())
            .with_commit(request.commit.clone());
        run.config = request.run_config();
        self.registry.insert_run(run);

        info!(branch = %request.branch, run = %run_id, queue = %self.queue, "queued launch");
        self.submitted.lock().push(request);

        Ok(QueuedRun {
            run_id,
            name,
            queue: self.queue.clone(),
        })
    }
}
