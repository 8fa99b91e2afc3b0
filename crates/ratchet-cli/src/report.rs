//! `report`: one-page experiment report across every branch

use crate::compare::{latest_finished_per_branch, latest_per_branch, print_table};
use crate::output;
use crate::{EXIT_NO_RUNS, EXIT_OK};
use anyhow::Result;
use indexmap::IndexMap;
use ratchet_compare::{config_diff, ComparisonSpec, ConfigDiffRow, Contender, WinTally};
use ratchet_registry::{ConfigMap, Run, RunFilter, RunRegistry, RunState};

/// Everything the report prints, gathered before any rendering
struct ReportView<'a> {
    project: &'a str,
    entity: Option<&'a str>,
    total: usize,
    latest: &'a IndexMap<String, Run>,
    contenders: &'a [Contender],
    tally: &'a WinTally,
    diff: &'a [ConfigDiffRow],
    problematic: &'a [&'a Run],
    in_flight: &'a [(&'a Run, Option<u64>)],
}

pub(crate) async fn run(
    registry: &dyn RunRegistry,
    project: &str,
    entity: Option<&str>,
    metrics: Option<Vec<String>>,
    json: bool,
) -> Result<i32> {
    let runs = registry.list_runs(&RunFilter::new()).await?;
    if runs.is_empty() {
        println!("No runs found.");
        return Ok(EXIT_NO_RUNS);
    }
    let total = runs.len();

    let latest = latest_per_branch(runs.clone());
    let finished = latest_finished_per_branch(runs);
    let contenders: Vec<Contender> = finished
        .iter()
        .map(|(branch, run)| Contender::new(branch.clone(), run.summary.clone()))
        .collect();

    let mut spec = ComparisonSpec::new();
    if let Some(metrics) = metrics {
        spec = spec.with_metrics(metrics);
    }
    let tally = WinTally::rank(&contenders, &spec);

    let configs: Vec<(String, ConfigMap)> = finished
        .iter()
        .map(|(branch, run)| (branch.clone(), run.config.clone()))
        .collect();
    let diff = config_diff(&configs);

    let problematic: Vec<&Run> = latest
        .values()
        .filter(|run| matches!(run.state, RunState::Failed | RunState::Crashed))
        .collect();

    let mut in_flight: Vec<(&Run, Option<u64>)> = Vec::new();
    for run in latest.values().filter(|run| run.state.is_active()) {
        let last_step = registry.get_history(&run.id).await?.last().map(|s| s.step);
        in_flight.push((run, last_step));
    }

    if json {
        let payload = serde_json::json!({
            "project": project,
            "entity": entity,
            "generated_at": chrono::Utc::now(),
            "total_runs": total,
            "branches": latest.values().collect::<Vec<_>>(),
            "tally": tally,
            "config_diff": diff,
            "problematic": problematic,
            "in_flight": in_flight.iter().map(|(run, _)| *run).collect::<Vec<_>>(),
            "recommended": tally.top(),
        });
        output::print_json(&payload)?;
        return Ok(EXIT_OK);
    }

    print_report(&ReportView {
        project,
        entity,
        total,
        latest: &latest,
        contenders: &contenders,
        tally: &tally,
        diff: &diff,
        problematic: &problematic,
        in_flight: &in_flight,
    });
    Ok(EXIT_OK)
}

fn print_report(view: &ReportView<'_>) {
    let qualified = match view.entity {
        Some(entity) => format!("{entity}/{}", view.project),
        None => view.project.to_string(),
    };
    println!("{}", "=".repeat(80));
    println!("EXPERIMENT REPORT");
    println!("{}", "=".repeat(80));
    println!("Project: {qualified}");
    println!("Total runs: {}", view.total);
    println!("Branches: {}", view.latest.len());

    println!();
    println!("{}", output::heading("Branch Status"));
    println!(
        "{:<28} {:<30} {:<10} {}",
        "Branch", "Run", "State", "Created"
    );
    for (branch, run) in view.latest {
        println!(
            "{:<28} {:<30} {:<10} {}",
            branch,
            run.name,
            run.state.label(),
            output::timestamp(run.created_at),
        );
    }

    println!();
    println!("{}", output::heading("Metric Comparison (finished runs)"));
    if view.tally.bests.is_empty() {
        println!("(no finished runs with numeric metrics)");
    } else {
        print_table(view.contenders, view.tally);
    }

    println!();
    println!("{}", output::heading("Hyperparameter Diff"));
    print_config_diff(view.diff, view.contenders);

    println!();
    println!("{}", output::heading("Problematic Runs"));
    if view.problematic.is_empty() {
        println!("(none)");
    }
    for run in view.problematic {
        println!(
            "  {}: {} ({})",
            run.branch.as_deref().unwrap_or("-"),
            run.name,
            run.state.label()
        );
    }

    println!();
    println!("{}", output::heading("Still Running"));
    if view.in_flight.is_empty() {
        println!("(none)");
    }
    for (run, last_step) in view.in_flight {
        let progress = match last_step {
            Some(step) => format!("step {step}"),
            None => "no steps logged yet".to_string(),
        };
        println!(
            "  {}: {} ({progress})",
            run.branch.as_deref().unwrap_or("-"),
            run.name
        );
    }

    println!();
    println!("{}", output::heading("Recommendations"));
    print_recommendations(view.tally);
}

fn print_config_diff(diff: &[ConfigDiffRow], contenders: &[Contender]) {
    if diff.is_empty() {
        println!("(no differing hyperparameters)");
        return;
    }
    let mut header = format!("{:<24}", "Key");
    for contender in contenders {
        header.push_str(&format!("{:<26}", contender.name));
    }
    println!("{header}");
    for row in diff {
        let mut line = format!("{:<24}", row.key);
        for contender in contenders {
            let cell = row
                .values
                .get(&contender.name)
                .and_then(|v| v.as_ref())
                .map_or_else(|| "-".to_string(), ToString::to_string);
            line.push_str(&format!("{cell:<26}"));
        }
        println!("{line}");
    }
}

fn print_recommendations(tally: &WinTally) {
    if tally.wins.is_empty() || tally.bests.is_empty() {
        println!("No finished runs to rank.");
        return;
    }
    println!("Recommended winners (by metric win count):");
    for (rank, (branch, wins)) in tally.ranking().into_iter().enumerate() {
        let noun = if wins == 1 { "win" } else { "wins" };
        println!("  {}. {branch} ({wins} {noun})", rank + 1);
    }
    let top = tally.top();
    if !top.is_empty() {
        println!("Promotion set at current counts: {}", top.join(", "));
    }
}
