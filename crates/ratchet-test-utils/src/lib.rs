//! Shared fixtures for exercising the ratchet crates
//!
//! Run factories, metric curves, and preloaded in-memory backends so tests
//! describe scenarios instead of setup plumbing.

#![allow(missing_docs)]
#![allow(clippy::missing_panics_doc)]

use ratchet_forge::{CodeHost, MemoryForge};
use ratchet_registry::{HistoryStep, MetricMap, Run, RunState, Snapshot};

/// Summary metrics from name/value pairs
#[must_use]
pub fn summary(pairs: &[(&str, f64)]) -> MetricMap {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

/// Finished run named `{branch}-{id}` carrying the given summary
#[must_use]
pub fn finished_run(id: &str, branch: &str, metrics: &[(&str, f64)]) -> Run {
    let mut run = Run::new(id, format!("{branch}-{id}"))
        .with_branch(branch)
        .with_state(RunState::Finished);
    for (name, value) in metrics {
        run = run.with_metric(*name, *value);
    }
    run
}

/// Run parked in the given state, named `{branch}-{id}`
#[must_use]
pub fn run_in_state(id: &str, branch: &str, state: RunState) -> Run {
    Run::new(id, format!("{branch}-{id}"))
        .with_branch(branch)
        .with_state(state)
}

/// Linearly decaying loss curve, `points` steps logged 100 apart
#[must_use]
pub fn loss_curve(points: u32, start: f64, slope: f64) -> Vec<HistoryStep> {
    (0..points)
        .map(|i| HistoryStep {
            step: u64::from(i) * 100,
            values: summary(&[("loss", start - f64::from(i) * slope)]),
        })
        .collect()
}

/// Snapshot with a finished trunk baseline, one strictly better experiment
/// branch (with a full loss curve), and a crashed run that logged an
/// out-of-memory error
#[must_use]
pub fn demo_snapshot() -> Snapshot {
    let mut snapshot = Snapshot {
        project: "demo".to_string(),
        ..Snapshot::default()
    };
    snapshot.runs.push(finished_run(
        "r1",
        "main",
        &[("loss", 0.42), ("accuracy", 0.90)],
    ));
    snapshot.runs.push(finished_run(
        "r2",
        "tune-lr",
        &[("loss", 0.38), ("accuracy", 0.92)],
    ));
    snapshot
        .runs
        .push(run_in_state("r3", "flaky", RunState::Crashed));
    snapshot
        .history
        .insert("r2".to_string(), loss_curve(50, 0.5, 0.001));
    snapshot.logs.insert(
        "r3".to_string(),
        vec![
            "loading checkpoint".to_string(),
            "CUDA error: out of memory".to_string(),
        ],
    );
    snapshot
}

/// Forge with an open review for the given branch
pub async fn forge_with_review(branch: &str) -> MemoryForge {
    let forge = MemoryForge::new();
    forge
        .open_review(
            branch,
            &format!("Experiment: {branch}"),
            "automated experiment branch",
        )
        .await
        .unwrap();
    forge
}
