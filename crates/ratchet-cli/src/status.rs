//! `status`: every tracked run, newest first, with a state tally

use crate::output;
use crate::{EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use indexmap::IndexMap;
use ratchet_registry::{Run, RunFilter, RunRegistry};

pub(crate) async fn run(
    registry: &dyn RunRegistry,
    branch: Option<&str>,
    json: bool,
) -> Result<i32> {
    let mut filter = RunFilter::new();
    if let Some(branch) = branch {
        filter = filter.with_branch(branch);
    }
    let runs = registry.list_runs(&filter).await?;
    if runs.is_empty() {
        println!("No runs found.");
        return Ok(EXIT_NO_RUNS);
    }
    if json {
        output::print_json(&runs)?;
        return Ok(EXIT_OK);
    }

    println!(
        "{:<28} {:<30} {:<10} {}",
        "Branch", "Run", "State", "Created"
    );
    println!("{}", "-".repeat(88));
    for run in &runs {
        println!(
            "{:<28} {:<30} {:<10} {}",
            run.branch.as_deref().unwrap_or("-"),
            run.name,
            run.state.label(),
            output::timestamp(run.created_at),
        );
    }
    println!();
    println!("{}", tally_line(&runs));
    Ok(EXIT_OK)
}

/// One-line state tally, states in order of first appearance
fn tally_line(runs: &[Run]) -> String {
    let mut counts: IndexMap<&'static str, usize> = IndexMap::new();
    for run in runs {
        *counts.entry(run.state.label()).or_insert(0) += 1;
    }
    let parts: Vec<String> = counts
        .iter()
        .map(|(state, n)| format!("{n} {state}"))
        .collect();
    format!("{} runs: {}", runs.len(), parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratchet_registry::RunState;

    #[test]
    fn tally_counts_states_in_first_seen_order() {
        let runs = vec![
            Run::new("r1", "a-1").with_state(RunState::Finished),
            Run::new("r2", "b-1").with_state(RunState::Running),
            Run::new("r3", "c-1").with_state(RunState::Finished),
        ];
        assert_eq!(tally_line(&runs), "3 runs: 2 finished, 1 running");
    }
}
