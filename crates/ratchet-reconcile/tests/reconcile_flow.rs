//! End-to-end reconciliation behavior over in-memory collaborators
//!
//! Covers the gate refusal, the happy path (rank, merge, relaunch,
//! close), operator decisions at the quality gate, and the two halt
//! modes: merge conflicts and smoke-check failures.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use ratchet_compare::ComparisonSpec;
use ratchet_forge::{CodeHost, CommitId, MemoryForge, Trunk};
use ratchet_lifecycle::{Baseline, Batch, Board, Branch, BranchState};
use ratchet_registry::{
    LaunchQueue, MemoryQueue, MemoryRegistry, MetricMap, Run, RunId, RunRegistry, RunState,
};
use ratchet_reconcile::{
    archive_settled, AlwaysHealthy, ApproveAll, Finding, OperatorDecision, ReconcileError,
    Reconciler, ReviewPass, ReviewPassError, Severity, SmokeCheck, SmokeOutcome,
};
use ratchet_verdict::Verdict;

fn summary(pairs: &[(&str, f64)]) -> MetricMap {
    pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
}

/// Review pass returning canned findings per branch
struct ScriptedReviewer {
    findings: HashMap<String, Vec<Finding>>,
}

impl ScriptedReviewer {
    fn blocking(branch: &str, message: &str) -> Self {
        let mut findings = HashMap::new();
        findings.insert(
            branch.to_string(),
            vec![Finding::new(Severity::Blocker, message)],
        );
        Self { findings }
    }
}

#[async_trait]
impl ReviewPass for ScriptedReviewer {
    async fn review(&self, branch: &str) -> Result<Vec<Finding>, ReviewPassError> {
        Ok(self.findings.get(branch).cloned().unwrap_or_default())
    }
}

/// Smoke check that fails every time
struct BrokenTrunk;

#[async_trait]
impl SmokeCheck for BrokenTrunk {
    async fn check(&self, _head: &CommitId) -> SmokeOutcome {
        SmokeOutcome::Failed {
            detail: "trunk tests failed".to_string(),
        }
    }
}

struct Scenario {
    registry: Arc<MemoryRegistry>,
    queue: Arc<MemoryQueue>,
    forge: Arc<MemoryForge>,
    board: Board,
    batch: Batch,
    trunk: Trunk,
}

impl Scenario {
    fn new() -> Self {
        let registry = Arc::new(MemoryRegistry::new());
        let queue = Arc::new(MemoryQueue::new("gpu-pool", Arc::clone(&registry)));
        let forge = Arc::new(MemoryForge::new());
        let trunk = Trunk::new(Arc::clone(&forge) as Arc<dyn CodeHost>);
        let baseline = Baseline::new(
            "base-1",
            "main",
            "m000000",
            summary(&[("loss", 0.42), ("accuracy", 0.90)]),
        );
        Self {
            registry,
            queue,
            forge,
            board: Board::new(),
            batch: Batch::new(baseline),
            trunk,
        }
    }

    /// Register a member that finished and was evaluated
    fn evaluated_member(&mut self, name: &str, run: &str, metrics: &[(&str, f64)]) {
        self.board.register(Branch::new(name)).unwrap();
        for (to, reason) in [
            (BranchState::Implementing, "accepted"),
            (BranchState::Launched, "submitted"),
            (BranchState::Finished, "completed"),
            (BranchState::Evaluated, "compared"),
        ] {
            self.board.advance(name, to, reason).unwrap();
        }

        let run_id = RunId::from(run);
        let mut record = Run::new(run_id.clone(), format!("{name}-run")).with_branch(name);
        record.state = RunState::Finished;
        record.summary = summary(metrics);
        self.registry.insert_run(record);
        self.board.record_run(name, run_id).unwrap();
        self.batch.add_member(name);
    }

    /// Register a member that already lost (early discard path)
    fn discarded_member(&mut self, name: &str) {
        self.board.register(Branch::new(name)).unwrap();
        for (to, reason) in [
            (BranchState::Implementing, "accepted"),
            (BranchState::Launched, "submitted"),
            (BranchState::Finished, "completed"),
            (BranchState::Evaluated, "compared"),
            (BranchState::Loser, "no metric improved"),
        ] {
            self.board.advance(name, to, reason).unwrap();
        }
        self.board.set_verdict(name, Verdict::Loser).unwrap();
        self.batch.add_member(name);
    }

    fn reconciler(&self) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.registry) as Arc<dyn RunRegistry>,
            Arc::clone(&self.forge) as Arc<dyn CodeHost>,
            Arc::clone(&self.queue) as Arc<dyn LaunchQueue>,
            Arc::new(ApproveAll),
            Arc::new(AlwaysHealthy),
        )
        .with_comparison(ComparisonSpec::new())
    }

    fn reconciler_with(
        &self,
        reviewer: Arc<dyn ReviewPass>,
        smoke: Arc<dyn SmokeCheck>,
    ) -> Reconciler {
        Reconciler::new(
            Arc::clone(&self.registry) as Arc<dyn RunRegistry>,
            Arc::clone(&self.forge) as Arc<dyn CodeHost>,
            Arc::clone(&self.queue) as Arc<dyn LaunchQueue>,
            reviewer,
            smoke,
        )
    }

    fn state_of(&self, name: &str) -> BranchState {
        self.board.get(name).unwrap().state
    }
}

#[tokio::test]
async fn gate_refuses_while_a_member_is_unsettled() {
    let mut scenario = Scenario::new();
    scenario.evaluated_member("tune-lr", "r-tune", &[("loss", 0.38)]);

    // wider-ffn launched but never finished
    scenario.board.register(Branch::new("wider-ffn")).unwrap();
    scenario
        .board
        .advance("wider-ffn", BranchState::Implementing, "accepted")
        .unwrap();
    scenario
        .board
        .advance("wider-ffn", BranchState::Launched, "submitted")
        .unwrap();
    scenario.batch.add_member("wider-ffn");

    let reconciler = scenario.reconciler();
    let mut writer = scenario.trunk.try_writer().unwrap();
    let err = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap_err();

    match err {
        ReconcileError::BatchNotReady { pending } => {
            assert_eq!(pending, vec!["wider-ffn".to_string()]);
        }
        other => panic!("expected BatchNotReady, got {other}"),
    }
    // nothing moved
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Evaluated);
    assert!(scenario.queue.submitted().is_empty());
}

#[tokio::test]
async fn full_flow_merges_winner_relaunches_baseline_closes_losers() {
    let mut scenario = Scenario::new();
    scenario.evaluated_member("tune-lr", "r-tune", &[("loss", 0.38), ("accuracy", 0.92)]);
    scenario.evaluated_member("wider-ffn", "r-ffn", &[("loss", 0.40), ("accuracy", 0.91)]);
    scenario.discarded_member("drop-warmup");

    // the loser already has a review up; it must get closed
    let loser_review = scenario
        .forge
        .open_review("wider-ffn", "Wider FFN", "")
        .await
        .unwrap();

    let reconciler = scenario.reconciler();
    let mut writer = scenario.trunk.try_writer().unwrap();
    let outcome = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap();

    assert_eq!(outcome.promotion.winners, vec!["tune-lr".to_string()]);
    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(outcome.merged[0].branch, "tune-lr");

    // board landed where it should
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Merged);
    assert_eq!(scenario.state_of("wider-ffn"), BranchState::Closed);
    assert_eq!(scenario.state_of("drop-warmup"), BranchState::Closed);
    assert_eq!(
        scenario.board.get("tune-lr").unwrap().verdict,
        Verdict::Winner
    );

    // loser review was closed on the forge
    let closed = scenario.forge.get_review(loser_review.id).await.unwrap();
    assert_eq!(closed.state, ratchet_forge::ReviewState::Closed);
    assert!(outcome.closed.contains(&"wider-ffn".to_string()));
    assert!(outcome.closed.contains(&"drop-warmup".to_string()));

    // fresh baseline run queued from the new trunk head
    let queued = outcome.baseline_run.unwrap();
    let head = scenario.forge.trunk_head().await.unwrap();
    let submitted = scenario.queue.submitted();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].branch, "main");
    assert_eq!(submitted[0].commit, head.0);
    let run = scenario.registry.get_run(&queued.run_id).await.unwrap();
    assert_eq!(run.state, RunState::Queued);

    // every move is in the audit chain
    scenario.board.verify_audit().unwrap();

    // merged and closed members can then be archived
    let archived = archive_settled(&scenario.board, &scenario.batch).unwrap();
    assert_eq!(archived.len(), 3);
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Archived);
}

#[tokio::test]
async fn blockers_without_decision_demote_the_winner() {
    let mut scenario = Scenario::new();
    scenario.evaluated_member("tune-lr", "r-tune", &[("loss", 0.38), ("accuracy", 0.92)]);
    scenario.evaluated_member("wider-ffn", "r-ffn", &[("loss", 0.40), ("accuracy", 0.91)]);

    let review = scenario
        .forge
        .open_review("tune-lr", "Tune LR", "")
        .await
        .unwrap();

    let reconciler = scenario.reconciler_with(
        Arc::new(ScriptedReviewer::blocking("tune-lr", "no eval on held-out set")),
        Arc::new(AlwaysHealthy),
    );
    let mut writer = scenario.trunk.try_writer().unwrap();
    let outcome = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap();

    assert!(outcome.merged.is_empty());
    assert!(outcome.baseline_run.is_none());
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Closed);
    assert_eq!(
        scenario.board.get("tune-lr").unwrap().verdict,
        Verdict::Loser
    );

    // findings were recorded on the review before it was closed
    let fetched = scenario.forge.get_review(review.id).await.unwrap();
    assert!(fetched
        .comments
        .iter()
        .any(|c| c.contains("[blocker] no eval on held-out set")));
}

#[tokio::test]
async fn merge_anyway_clears_a_blocked_winner() {
    let mut scenario = Scenario::new();
    scenario.evaluated_member("tune-lr", "r-tune", &[("loss", 0.38), ("accuracy", 0.92)]);
    scenario.evaluated_member("wider-ffn", "r-ffn", &[("loss", 0.40), ("accuracy", 0.91)]);

    let reconciler = scenario.reconciler_with(
        Arc::new(ScriptedReviewer::blocking("tune-lr", "style only")),
        Arc::new(AlwaysHealthy),
    );
    reconciler.record_decision("tune-lr", OperatorDecision::MergeAnyway);

    let mut writer = scenario.trunk.try_writer().unwrap();
    let outcome = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap();

    assert_eq!(outcome.merged.len(), 1);
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Merged);
    assert_eq!(outcome.gate[0].decision, Some(OperatorDecision::MergeAnyway));
}

#[tokio::test]
async fn return_for_fix_reopens_implementation() {
    let mut scenario = Scenario::new();
    scenario.evaluated_member("tune-lr", "r-tune", &[("loss", 0.38), ("accuracy", 0.92)]);
    scenario.evaluated_member("wider-ffn", "r-ffn", &[("loss", 0.40), ("accuracy", 0.91)]);

    let reconciler = scenario.reconciler_with(
        Arc::new(ScriptedReviewer::blocking("tune-lr", "loss spike unexplained")),
        Arc::new(AlwaysHealthy),
    );
    reconciler.record_decision("tune-lr", OperatorDecision::ReturnForFix);

    let mut writer = scenario.trunk.try_writer().unwrap();
    let outcome = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap();

    assert!(outcome.merged.is_empty());
    assert_eq!(outcome.returned, vec!["tune-lr".to_string()]);
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Implementing);
    assert_eq!(
        scenario.board.get("tune-lr").unwrap().verdict,
        Verdict::Unevaluated
    );
}

#[tokio::test]
async fn conflict_halts_the_sequence_and_keeps_prior_merges() {
    let mut scenario = Scenario::new();
    // one win each: a tie at the top, both promoted, alphabetical order
    scenario.evaluated_member("alpha", "r-a", &[("loss", 0.38), ("accuracy", 0.89)]);
    scenario.evaluated_member("beta", "r-b", &[("loss", 0.40), ("accuracy", 0.92)]);
    scenario.forge.set_touched_paths("alpha", &["model.py"]);
    scenario.forge.set_touched_paths("beta", &["model.py"]);

    let reconciler = scenario.reconciler();
    let mut writer = scenario.trunk.try_writer().unwrap();
    let err = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap_err();

    let ReconcileError::Conflict(report) = err else {
        panic!("expected a conflict");
    };
    assert_eq!(report.branch, "beta");
    assert_eq!(report.files, vec!["model.py".to_string()]);
    assert_eq!(report.merged.len(), 1);
    assert_eq!(report.merged[0].branch, "alpha");
    assert!(report.remaining.is_empty());

    // alpha stays merged, beta stays pending an explicit resolution
    assert_eq!(scenario.state_of("alpha"), BranchState::Merged);
    assert_eq!(scenario.state_of("beta"), BranchState::WinnerPendingReview);
    assert_eq!(scenario.forge.trunk_history().len(), 2);
    assert!(scenario.queue.submitted().is_empty());
}

#[tokio::test]
async fn smoke_failure_halts_but_never_unwinds() {
    let mut scenario = Scenario::new();
    scenario.evaluated_member("tune-lr", "r-tune", &[("loss", 0.38), ("accuracy", 0.92)]);
    scenario.evaluated_member("wider-ffn", "r-ffn", &[("loss", 0.40), ("accuracy", 0.91)]);

    let reconciler = scenario.reconciler_with(Arc::new(ApproveAll), Arc::new(BrokenTrunk));
    let mut writer = scenario.trunk.try_writer().unwrap();
    let err = reconciler
        .reconcile(&scenario.board, &scenario.batch, &mut writer)
        .await
        .unwrap_err();

    match err {
        ReconcileError::SmokeCheckFailed { branch, detail } => {
            assert_eq!(branch, "tune-lr");
            assert_eq!(detail, "trunk tests failed");
        }
        other => panic!("expected SmokeCheckFailed, got {other}"),
    }
    // the merge that preceded the failure stays on the trunk
    assert_eq!(scenario.state_of("tune-lr"), BranchState::Merged);
    assert_eq!(scenario.forge.trunk_history().len(), 2);
    assert!(scenario.queue.submitted().is_empty());
}
