//! Orchestrator configuration

use std::time::Duration;

use ratchet_compare::ComparisonSpec;
use ratchet_registry::Backoff;
use serde::{Deserialize, Serialize};

/// Environment variable naming the tracking project
pub const ENV_PROJECT: &str = "RATCHET_PROJECT";
/// Environment variable naming the tracking entity (team or user)
pub const ENV_ENTITY: &str = "RATCHET_ENTITY";
/// Environment variable naming the launch queue
pub const ENV_QUEUE: &str = "RATCHET_QUEUE";
/// Environment variable naming the trunk branch
pub const ENV_TRUNK: &str = "RATCHET_TRUNK";

/// Knobs for a whole experiment campaign
///
/// Serde-loadable; every field has a default so partial configs work.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Tracking project runs are filed under
    pub project: String,
    /// Tracking entity (team or user), when the service distinguishes one
    pub entity: Option<String>,
    /// Launch queue runs are submitted to
    pub queue: String,
    /// Branch the baseline lives on
    pub trunk_branch: String,
    /// How often a driving loop should observe run states
    pub poll_interval: Duration,
    /// Diagnose-and-fix attempts before a failing branch is demoted
    pub max_fix_attempts: u32,
    /// Which metrics matter and which way they improve
    pub comparison: ComparisonSpec,
    /// Retry policy for registry calls
    pub backoff: Backoff,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            project: "ratchet".to_string(),
            entity: None,
            queue: "default".to_string(),
            trunk_branch: "main".to_string(),
            poll_interval: Duration::from_secs(30),
            max_fix_attempts: 3,
            comparison: ComparisonSpec::new(),
            backoff: Backoff::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Defaults overridden by `RATCHET_*` environment variables
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(project) = std::env::var(ENV_PROJECT) {
            config.project = project;
        }
        if let Ok(entity) = std::env::var(ENV_ENTITY) {
            config.entity = Some(entity);
        }
        if let Ok(queue) = std::env::var(ENV_QUEUE) {
            config.queue = queue;
        }
        if let Ok(trunk) = std::env::var(ENV_TRUNK) {
            config.trunk_branch = trunk;
        }
        config
    }

    /// With a tracking project
    #[inline]
    #[must_use]
    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// With a trunk branch
    #[inline]
    #[must_use]
    pub fn with_trunk_branch(mut self, branch: impl Into<String>) -> Self {
        self.trunk_branch = branch.into();
        self
    }

    /// With a comparison spec
    #[inline]
    #[must_use]
    pub fn with_comparison(mut self, comparison: ComparisonSpec) -> Self {
        self.comparison = comparison;
        self
    }

    /// With a fix-attempt budget
    #[inline]
    #[must_use]
    pub fn with_max_fix_attempts(mut self, attempts: u32) -> Self {
        self.max_fix_attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.trunk_branch, "main");
        assert_eq!(config.max_fix_attempts, 3);
        assert!(config.entity.is_none());
    }

    #[test]
    fn partial_json_fills_in_defaults() {
        let config: OrchestratorConfig =
            serde_json::from_str(r#"{"project": "lm-tuning", "max_fix_attempts": 1}"#).unwrap();
        assert_eq!(config.project, "lm-tuning");
        assert_eq!(config.max_fix_attempts, 1);
        assert_eq!(config.queue, "default");
    }
}
