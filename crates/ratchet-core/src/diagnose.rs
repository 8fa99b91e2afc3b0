//! Failure triage for runs that did not finish

use ratchet_registry::{ConfigMap, HistoryStep, RegistryError, RunId, RunRegistry, RunState};
use serde::{Deserialize, Serialize};

/// Log lines pulled by default when diagnosing
pub const DEFAULT_LOG_LINES: usize = 50;
/// History steps pulled by default when diagnosing
pub const DEFAULT_LAST_STEPS: usize = 5;

/// Everything gathered about a failed or crashed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnosis {
    /// The diagnosed run
    pub run: RunId,
    /// Terminal state observed
    pub state: RunState,
    /// Last lines of captured output
    pub log_tail: Vec<String>,
    /// Hyperparameters the run was launched with
    pub config: ConfigMap,
    /// Last recorded metric steps before the end
    pub last_steps: Vec<HistoryStep>,
    /// Log lines that look like errors, for quick scanning
    pub error_lines: Vec<String>,
}

impl Diagnosis {
    /// Whether the captured output contains anything error-shaped
    #[inline]
    #[must_use]
    pub fn has_errors(&self) -> bool {
        !self.error_lines.is_empty()
    }
}

fn extract_error_lines(log_tail: &[String]) -> Vec<String> {
    log_tail
        .iter()
        .filter(|line| {
            let lower = line.to_lowercase();
            lower.contains("error")
                || lower.contains("exception")
                || lower.contains("traceback")
                || lower.contains("out of memory")
        })
        .cloned()
        .collect()
}

/// Gather a run's failure context from the registry
pub async fn diagnose(
    registry: &dyn RunRegistry,
    run_id: &RunId,
    log_lines: usize,
    last_steps: usize,
) -> Result<Diagnosis, RegistryError> {
    let run = registry.get_run(run_id).await?;
    let log_tail = registry.log_tail(run_id, log_lines).await?;
    let history = registry.get_history(run_id).await?;
    let tail_start = history.len().saturating_sub(last_steps);
    let error_lines = extract_error_lines(&log_tail);
    Ok(Diagnosis {
        run: run_id.clone(),
        state: run.state,
        log_tail,
        config: run.config,
        last_steps: history[tail_start..].to_vec(),
        error_lines,
    })
}
