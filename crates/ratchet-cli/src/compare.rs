//! `compare`: newest finished run per branch, ranked by metric wins

use crate::output;
use crate::{EXIT_AMBIGUOUS, EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use indexmap::IndexMap;
use ratchet_compare::{ComparisonSpec, Contender, WinTally};
use ratchet_registry::{Run, RunFilter, RunRegistry, RunState};
use serde::Serialize;

/// Payload emitted by `compare --json`
#[derive(Debug, Serialize)]
struct Rankings {
    contenders: Vec<Contender>,
    tally: WinTally,
}

/// Newest run per branch; input is expected newest-first as the registry
/// returns it. Runs without a branch group under their display name.
pub(crate) fn latest_per_branch(runs: Vec<Run>) -> IndexMap<String, Run> {
    let mut by_branch = IndexMap::new();
    for run in runs {
        let key = run.branch.clone().unwrap_or_else(|| run.name.clone());
        by_branch.entry(key).or_insert(run);
    }
    by_branch
}

/// Newest finished run per branch
pub(crate) fn latest_finished_per_branch(runs: Vec<Run>) -> IndexMap<String, Run> {
    latest_per_branch(
        runs.into_iter()
            .filter(|r| r.state == RunState::Finished)
            .collect(),
    )
}

/// Contenders for a multi-way comparison, optionally restricted to the
/// given branches (kept in the order requested)
pub(crate) async fn gather(
    registry: &dyn RunRegistry,
    branches: Option<&[String]>,
) -> Result<Vec<Contender>> {
    let finished = registry
        .list_runs(&RunFilter::new().with_states(vec![RunState::Finished]))
        .await?;
    let by_branch = latest_finished_per_branch(finished);
    let contenders = match branches {
        Some(wanted) => {
            let mut picked = Vec::with_capacity(wanted.len());
            for branch in wanted {
                match by_branch.get(branch) {
                    Some(run) => picked.push(Contender::new(branch.clone(), run.summary.clone())),
                    None => tracing::warn!(
                        branch = branch.as_str(),
                        "no finished run for requested branch"
                    ),
                }
            }
            picked
        }
        None => by_branch
            .iter()
            .map(|(branch, run)| Contender::new(branch.clone(), run.summary.clone()))
            .collect(),
    };
    Ok(contenders)
}

pub(crate) async fn run(
    registry: &dyn RunRegistry,
    branches: Option<Vec<String>>,
    metrics: Option<Vec<String>>,
    json: bool,
) -> Result<i32> {
    let contenders = gather(registry, branches.as_deref()).await?;
    if contenders.is_empty() {
        println!("No finished runs found.");
        return Ok(EXIT_NO_RUNS);
    }

    let mut spec = ComparisonSpec::new();
    if let Some(metrics) = metrics {
        spec = spec.with_metrics(metrics);
    }
    let tally = WinTally::rank(&contenders, &spec);
    if tally.bests.is_empty() {
        println!("No numeric metrics to compare.");
        return Ok(EXIT_AMBIGUOUS);
    }

    if json {
        output::print_json(&Rankings { contenders, tally })?;
        return Ok(EXIT_OK);
    }
    print_table(&contenders, &tally);
    Ok(EXIT_OK)
}

/// Per-metric table with a `*` on the outright best value, then win counts
pub(crate) fn print_table(contenders: &[Contender], tally: &WinTally) {
    let mut header = format!("{:<24}", "Metric");
    for contender in contenders {
        header.push_str(&format!("{:<26}", contender.name));
    }
    header.push_str("Best");
    println!("{header}");
    println!("{}", "-".repeat(24 + 26 * contenders.len() + 4));

    for best in &tally.bests {
        let mut row = format!("{:<24}", best.metric);
        for contender in contenders {
            match contender.summary.get(&best.metric) {
                Some(value) => {
                    let marker = if best.best.as_deref() == Some(contender.name.as_str()) {
                        " *"
                    } else {
                        "  "
                    };
                    row.push_str(&format!("{:<24}{marker}", output::metric(*value)));
                }
                None => row.push_str(&format!("{:<26}", "-")),
            }
        }
        row.push_str(best.best.as_deref().unwrap_or("-"));
        println!("{row}");
    }

    println!();
    println!("Win count (strictly better on a metric; ties score nobody)");
    for (branch, wins) in tally.ranking() {
        println!("  {branch}: {wins}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use ratchet_registry::MemoryRegistry;
    use ratchet_test_utils::{finished_run, run_in_state};

    #[test]
    fn newest_run_wins_the_branch_slot() {
        let runs = vec![
            finished_run("r2", "tune-lr", &[("loss", 0.38)]),
            finished_run("r1", "tune-lr", &[("loss", 0.45)]),
        ];
        let by_branch = latest_per_branch(runs);
        assert_eq!(by_branch.len(), 1);
        assert_eq!(by_branch["tune-lr"].id.as_str(), "r2");
    }

    #[tokio::test]
    async fn gather_respects_requested_branch_order() {
        let registry = MemoryRegistry::new();
        registry.insert_run(finished_run("r1", "tune-lr", &[("loss", 0.38)]));
        registry.insert_run(finished_run("r2", "wider-ffn", &[("loss", 0.40)]));
        registry.insert_run(run_in_state("r3", "flaky", RunState::Queued));

        let wanted = vec!["wider-ffn".to_string(), "tune-lr".to_string()];
        let contenders = gather(&registry, Some(&wanted)).await.unwrap();
        let names: Vec<&str> = contenders.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["wider-ffn", "tune-lr"]);
    }
}
