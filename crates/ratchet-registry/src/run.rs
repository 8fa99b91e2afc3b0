//! Run records as seen through the tracking-service adapter
//!
//! Defines the shapes the rest of the workspace consumes:
//! - Run identifiers and lifecycle states reported by the service
//! - Summary metric maps (numeric-only, service keys stripped)
//! - Loosely-typed hyperparameter configs
//! - Per-step metric history and logged artifacts

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifier assigned to a run by the tracking service
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run lifecycle state as reported by the tracking service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    /// Accepted by the queue, not yet started
    Queued,
    /// Actively training
    Running,
    /// Completed normally
    Finished,
    /// Raised an error and stopped
    Failed,
    /// Died without reporting (OOM, preemption, lost heartbeat)
    Crashed,
    /// Stopped on request
    Cancelled,
}

impl RunState {
    /// Whether the service will never change this state again
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Failed | Self::Crashed | Self::Cancelled
        )
    }

    /// Whether the run still occupies queue or compute
    #[inline]
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Lowercase label used in tables and review labels
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Finished => "finished",
            Self::Failed => "failed",
            Self::Crashed => "crashed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Summary metrics keyed by name, insertion-ordered
pub type MetricMap = IndexMap<String, f64>;

/// Scalar hyperparameter value
///
/// Run configs arrive as loosely-typed payloads. Recognized scalars are
/// preserved verbatim; nested structure is rejected at the adapter boundary
/// rather than silently flattened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    /// Boolean flag
    Bool(bool),
    /// Integer parameter
    Int(i64),
    /// Floating-point parameter
    Float(f64),
    /// String parameter
    Text(String),
}

impl ConfigValue {
    /// Convert from a JSON value, rejecting nested payloads
    pub fn from_json(value: &serde_json::Value) -> Result<Self, UnsupportedConfigValue> {
        match value {
            serde_json::Value::Bool(b) => Ok(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Self::Int(i))
                } else if let Some(f) = n.as_f64() {
                    Ok(Self::Float(f))
                } else {
                    Err(UnsupportedConfigValue(value.to_string()))
                }
            }
            serde_json::Value::String(s) => Ok(Self::Text(s.clone())),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => Err(UnsupportedConfigValue(value.to_string())),
        }
    }

    /// String form if this value is text
    #[inline]
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// A config payload carried structure the adapter does not accept
#[derive(Debug, Clone, thiserror::Error)]
#[error("unsupported config value: {0}")]
pub struct UnsupportedConfigValue(pub String);

/// Hyperparameter config keyed by name, insertion-ordered
pub type ConfigMap = IndexMap<String, ConfigValue>;

/// A run record as surfaced by the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    /// Service-assigned identifier
    pub id: RunId,
    /// Display name (conventionally `{branch}-{commit8}`)
    pub name: String,
    /// Experiment branch injected at launch, absent for manual runs
    pub branch: Option<String>,
    /// Commit the run was launched from
    pub commit: Option<String>,
    /// Current lifecycle state
    pub state: RunState,
    /// Numeric summary metrics, service keys already stripped
    pub summary: MetricMap,
    /// Hyperparameters
    pub config: ConfigMap,
    /// Tags applied through the registry
    pub tags: Vec<String>,
    /// Free-form notes
    pub notes: Option<String>,
    /// When the run was created
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// When the run reached a terminal state
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl Run {
    /// Create a run record in the queued state
    #[must_use]
    pub fn new(id: impl Into<RunId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            branch: None,
            commit: None,
            state: RunState::Queued,
            summary: MetricMap::new(),
            config: ConfigMap::new(),
            tags: Vec::new(),
            notes: None,
            created_at: chrono::Utc::now(),
            finished_at: None,
        }
    }

    /// With experiment branch
    #[inline]
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// With source commit
    #[inline]
    #[must_use]
    pub fn with_commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = Some(commit.into());
        self
    }

    /// With state
    #[inline]
    #[must_use]
    pub fn with_state(mut self, state: RunState) -> Self {
        self.state = state;
        self
    }

    /// With a summary metric
    #[inline]
    #[must_use]
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.summary.insert(name.into(), value);
        self
    }

    /// With a config entry
    #[inline]
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.config.insert(key.into(), value);
        self
    }

    /// Whether this run belongs to the given branch
    #[inline]
    #[must_use]
    pub fn on_branch(&self, branch: &str) -> bool {
        self.branch.as_deref() == Some(branch)
    }
}

/// Strip a raw summary payload down to usable metrics
///
/// Service bookkeeping keys (leading underscore) and non-numeric values are
/// dropped. Key order of the incoming payload is preserved.
#[must_use]
pub fn sanitize_summary(raw: &serde_json::Map<String, serde_json::Value>) -> MetricMap {
    let mut summary = MetricMap::new();
    for (key, value) in raw {
        if key.starts_with('_') {
            continue;
        }
        if let Some(number) = value.as_f64() {
            summary.insert(key.clone(), number);
        }
    }
    summary
}

/// Metric values logged at one training step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryStep {
    /// Step counter
    pub step: u64,
    /// Values logged at this step
    pub values: MetricMap,
}

impl HistoryStep {
    /// Create a history step
    #[inline]
    #[must_use]
    pub fn new(step: u64) -> Self {
        Self {
            step,
            values: MetricMap::new(),
        }
    }

    /// With a logged value
    #[inline]
    #[must_use]
    pub fn with_value(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }
}

/// File or directory logged against a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Artifact name
    pub name: String,
    /// Artifact kind (checkpoint, dataset, plot, ...)
    pub kind: String,
    /// Stored size
    pub size_bytes: u64,
    /// Aliases pointing at this artifact (latest, best, ...)
    pub aliases: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_state_terminal() {
        assert!(RunState::Finished.is_terminal());
        assert!(RunState::Crashed.is_terminal());
        assert!(!RunState::Running.is_terminal());
        assert!(RunState::Queued.is_active());
    }

    #[test]
    fn sanitize_drops_service_keys_and_non_numeric() {
        let raw = serde_json::json!({
            "_runtime": 1234,
            "_step": 500,
            "loss": 0.42,
            "accuracy": 0.91,
            "notes": "warmup done",
            "samples": 10000
        });
        let summary = sanitize_summary(raw.as_object().unwrap());
        assert_eq!(summary.len(), 3);
        assert_eq!(summary["loss"], 0.42);
        assert_eq!(summary["accuracy"], 0.91);
        assert_eq!(summary["samples"], 10000.0);
        assert!(!summary.contains_key("_runtime"));
        assert!(!summary.contains_key("notes"));
    }

    #[test]
    fn config_value_rejects_nested() {
        let nested = serde_json::json!({"lr": 0.001});
        assert!(ConfigValue::from_json(&nested).is_err());
        let scalar = serde_json::json!(0.001);
        assert_eq!(
            ConfigValue::from_json(&scalar).unwrap(),
            ConfigValue::Float(0.001)
        );
    }

    #[test]
    fn run_builder() {
        let run = Run::new("r1", "feat-lr-decay-abc12345")
            .with_branch("feat-lr-decay")
            .with_state(RunState::Finished)
            .with_metric("loss", 0.37);
        assert!(run.on_branch("feat-lr-decay"));
        assert_eq!(run.summary["loss"], 0.37);
        assert_eq!(run.state, RunState::Finished);
    }
}
