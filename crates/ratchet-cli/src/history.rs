//! `history`: step metrics for a branch's newest finished run

use crate::output;
use crate::{EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use ratchet_registry::{HistoryStep, RunFilter, RunRegistry, RunState};

/// Head and tail slices to print. The tail is empty when everything fits
/// within `rows`; otherwise the two halves are separated by an elision
/// marker.
pub(crate) fn elide(steps: &[HistoryStep], rows: usize) -> (&[HistoryStep], &[HistoryStep]) {
    if rows == 0 || steps.len() <= rows {
        return (steps, &[]);
    }
    let head = rows / 2;
    let tail = rows - head;
    (&steps[..head], &steps[steps.len() - tail..])
}

/// Metric columns: the requested ones, or every key in first-logged order
pub(crate) fn metric_keys(steps: &[HistoryStep], selected: Option<&[String]>) -> Vec<String> {
    if let Some(selected) = selected {
        return selected.to_vec();
    }
    let mut keys: Vec<String> = Vec::new();
    for step in steps {
        for key in step.values.keys() {
            if !keys.iter().any(|k| k == key) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

pub(crate) async fn run(
    registry: &dyn RunRegistry,
    branch: &str,
    metrics: Option<Vec<String>>,
    rows: usize,
    json: bool,
) -> Result<i32> {
    let filter = RunFilter::new()
        .with_branch(branch)
        .with_states(vec![RunState::Finished]);
    let Some(run) = registry.list_runs(&filter).await?.into_iter().next() else {
        println!("No finished runs found for branch '{branch}'.");
        return Ok(EXIT_NO_RUNS);
    };
    let steps = registry.get_history(&run.id).await?;
    if steps.is_empty() {
        println!("No history recorded for run {}.", run.name);
        return Ok(EXIT_NO_RUNS);
    }
    let keys = metric_keys(&steps, metrics.as_deref());

    if json {
        let selected: Vec<HistoryStep> = steps
            .iter()
            .map(|step| HistoryStep {
                step: step.step,
                values: step
                    .values
                    .iter()
                    .filter(|(key, _)| keys.iter().any(|k| k == *key))
                    .map(|(key, value)| (key.clone(), *value))
                    .collect(),
            })
            .collect();
        output::print_json(&selected)?;
        return Ok(EXIT_OK);
    }

    println!("History for {} ({} steps)", run.name, steps.len());
    let mut header = format!("{:<10}", "Step");
    for key in &keys {
        header.push_str(&format!("{key:<18}"));
    }
    println!("{header}");
    println!("{}", "-".repeat(10 + 18 * keys.len()));

    let (head, tail) = elide(&steps, rows);
    for step in head {
        println!("{}", row(step, &keys));
    }
    if !tail.is_empty() {
        println!("...");
        for step in tail {
            println!("{}", row(step, &keys));
        }
    }
    Ok(EXIT_OK)
}

fn row(step: &HistoryStep, keys: &[String]) -> String {
    let mut line = format!("{:<10}", step.step);
    for key in keys {
        match step.values.get(key) {
            Some(value) => line.push_str(&format!("{:<18}", output::metric(*value))),
            None => line.push_str(&format!("{:<18}", "-")),
        }
    }
    line
}
