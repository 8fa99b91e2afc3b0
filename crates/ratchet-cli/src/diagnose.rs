//! `diagnose`: config, last steps, and log tail for problematic runs

use crate::output;
use crate::{EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use ratchet_core::{diagnose, Diagnosis, DEFAULT_LAST_STEPS};
use ratchet_registry::{MetricMap, RunFilter, RunRegistry, RunState};
use serde::Serialize;

/// Log lines shown per run
const LOG_TAIL_LINES: usize = 20;

/// One diagnosed run plus the display fields the diagnosis itself omits
#[derive(Debug, Serialize)]
struct DiagnosedRun {
    name: String,
    branch: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    summary: MetricMap,
    #[serde(flatten)]
    diagnosis: Diagnosis,
}

pub(crate) async fn run(
    registry: &dyn RunRegistry,
    branch: Option<&str>,
    limit: usize,
    json: bool,
) -> Result<i32> {
    let filter = match branch {
        Some(branch) => RunFilter::new().with_branch(branch).with_limit(limit),
        None => RunFilter::new()
            .with_states(vec![RunState::Failed, RunState::Crashed])
            .with_limit(limit),
    };
    let runs = registry.list_runs(&filter).await?;
    if runs.is_empty() {
        match branch {
            Some(branch) => println!("No runs found for branch '{branch}'."),
            None => println!("No problematic runs found."),
        }
        return Ok(EXIT_NO_RUNS);
    }

    let mut diagnosed = Vec::with_capacity(runs.len());
    for run in runs {
        let diagnosis = diagnose(registry, &run.id, LOG_TAIL_LINES, DEFAULT_LAST_STEPS).await?;
        diagnosed.push(DiagnosedRun {
            name: run.name,
            branch: run.branch,
            created_at: run.created_at,
            summary: run.summary,
            diagnosis,
        });
    }

    if json {
        output::print_json(&diagnosed)?;
        return Ok(EXIT_OK);
    }
    for entry in &diagnosed {
        print_run(entry);
    }
    Ok(EXIT_OK)
}

fn print_run(entry: &DiagnosedRun) {
    println!("{}", "=".repeat(80));
    println!("Run: {}  (ID: {})", entry.name, entry.diagnosis.run);
    println!("Branch: {}", entry.branch.as_deref().unwrap_or("-"));
    println!("State: {}", entry.diagnosis.state.label());
    println!("Created: {}", output::timestamp(entry.created_at));

    println!();
    println!("{}", output::heading("Config"));
    let mut keys: Vec<&String> = entry.diagnosis.config.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(value) = entry.diagnosis.config.get(key) {
            println!("  {key}: {value}");
        }
    }

    println!();
    println!("{}", output::heading("Summary"));
    if entry.summary.is_empty() {
        println!("  (no summary metrics)");
    }
    let mut metrics: Vec<&String> = entry.summary.keys().collect();
    metrics.sort();
    for key in metrics {
        if let Some(value) = entry.summary.get(key) {
            println!("  {key}: {}", output::metric(*value));
        }
    }

    println!();
    println!("{}", output::heading("Last History Steps"));
    if entry.diagnosis.last_steps.is_empty() {
        println!("  (no history)");
    }
    for step in &entry.diagnosis.last_steps {
        let values: Vec<String> = step
            .values
            .iter()
            .map(|(key, value)| format!("{key}={}", output::metric(*value)))
            .collect();
        println!("  step {}: {}", step.step, values.join("  "));
    }

    println!();
    println!("{}", output::heading("Log Tail"));
    if entry.diagnosis.log_tail.is_empty() {
        println!("  (no captured output)");
    }
    for line in &entry.diagnosis.log_tail {
        println!("    {line}");
    }

    if entry.diagnosis.has_errors() {
        println!();
        println!("{}", output::heading("Error Lines"));
        for line in &entry.diagnosis.error_lines {
            println!("    {line}");
        }
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_registry::{HistoryStep, MemoryRegistry, Run};

    #[tokio::test]
    async fn diagnoses_failed_and_crashed_runs_by_default() {
        let registry = MemoryRegistry::new();
        registry.insert_run(
            Run::new("r1", "tune-lr-r1")
                .with_branch("tune-lr")
                .with_state(RunState::Crashed),
        );
        registry.insert_run(
            Run::new("r2", "wider-ffn-r2")
                .with_branch("wider-ffn")
                .with_state(RunState::Finished),
        );
        registry.append_log(&"r1".into(), &["CUDA out of memory"]);
        registry.push_history(
            &"r1".into(),
            HistoryStep {
                step: 100,
                values: [("loss".to_string(), 0.7)].into_iter().collect(),
            },
        );

        let code = run(&registry, None, 5, true).await.unwrap();
        assert_eq!(code, EXIT_OK);
    }

    #[tokio::test]
    async fn reports_no_problematic_runs() {
        let registry = MemoryRegistry::new();
        registry.insert_run(
            Run::new("r1", "tune-lr-r1")
                .with_branch("tune-lr")
                .with_state(RunState::Finished),
        );
        let code = run(&registry, None, 5, false).await.unwrap();
        assert_eq!(code, EXIT_NO_RUNS);
    }
}
