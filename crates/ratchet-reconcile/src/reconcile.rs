//! The reconciler: gate, rank, merge, relaunch
//!
//! Reconciliation runs once per batch, only after every member settles.
//! Winners merge sequentially in ranking order with a smoke check after
//! each landing; a conflict or a failed check halts the sequence where
//! it stands rather than unwinding what already merged.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use ratchet_compare::{ComparisonSpec, Contender, WinTally};
use ratchet_forge::{CodeHost, ForgeError, MergeReceipt, Review, TrunkWriter};
use ratchet_lifecycle::{Batch, Board, BoardError, BranchState};
use ratchet_registry::{LaunchQueue, LaunchRequest, QueuedRun, RunRegistry};
use ratchet_verdict::{promote_finalists, Promotion, Verdict};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ConflictReport, ReconcileError};
use crate::quality::{Finding, OperatorDecision, ReviewPass};
use crate::smoke::{SmokeCheck, SmokeOutcome};

/// What the quality gate recorded for one winner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateRecord {
    /// Winner that was gated
    pub branch: String,
    /// Findings from the review pass
    pub findings: Vec<Finding>,
    /// Operator decision consumed, when blockers were present
    pub decision: Option<OperatorDecision>,
}

/// Everything one reconcile pass did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    /// Win counts across the batch's survivors
    pub tally: WinTally,
    /// Winner/loser split before the quality gate
    pub promotion: Promotion,
    /// Per-winner gate records, ranking order
    pub gate: Vec<GateRecord>,
    /// Merges that landed, in order
    pub merged: Vec<MergeReceipt>,
    /// Winners sent back to implementation by an operator
    pub returned: Vec<String>,
    /// Branches whose reviews were closed this pass
    pub closed: Vec<String>,
    /// Fresh trunk baseline run, submitted iff anything merged
    pub baseline_run: Option<QueuedRun>,
}

/// Reconciles a settled batch against the trunk
pub struct Reconciler {
    registry: Arc<dyn RunRegistry>,
    forge: Arc<dyn CodeHost>,
    queue: Arc<dyn LaunchQueue>,
    reviewer: Arc<dyn ReviewPass>,
    smoke: Arc<dyn SmokeCheck>,
    spec: ComparisonSpec,
    decisions: Mutex<HashMap<String, OperatorDecision>>,
}

impl Reconciler {
    /// Create a reconciler over the given collaborators
    #[must_use]
    pub fn new(
        registry: Arc<dyn RunRegistry>,
        forge: Arc<dyn CodeHost>,
        queue: Arc<dyn LaunchQueue>,
        reviewer: Arc<dyn ReviewPass>,
        smoke: Arc<dyn SmokeCheck>,
    ) -> Self {
        Self {
            registry,
            forge,
            queue,
            reviewer,
            smoke,
            spec: ComparisonSpec::new(),
            decisions: Mutex::new(HashMap::new()),
        }
    }

    /// With an explicit comparison spec
    #[must_use]
    pub fn with_comparison(mut self, spec: ComparisonSpec) -> Self {
        self.spec = spec;
        self
    }

    /// Record an operator decision for a winner held at the gate.
    ///
    /// Consumed by the next reconcile pass that finds blockers on the
    /// branch; decisions for clean branches are never consulted.
    pub fn record_decision(&self, branch: impl Into<String>, decision: OperatorDecision) {
        self.decisions.lock().insert(branch.into(), decision);
    }

    /// Reconcile a settled batch.
    ///
    /// 1. refuse unless every member has settled;
    /// 2. rank survivors by win count and promote the top;
    /// 3. quality-gate each winner;
    /// 4. merge cleared winners sequentially in ranking order, smoke
    ///    checking the trunk after each landing;
    /// 5. submit a fresh trunk baseline run and close out the losers.
    pub async fn reconcile(
        &self,
        board: &Board,
        batch: &Batch,
        trunk: &mut TrunkWriter,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let gate = board.gate_status(batch);
        if !gate.ready {
            return Err(ReconcileError::BatchNotReady {
                pending: gate.pending,
            });
        }
        info!(batch = %batch.id, members = batch.len(), "reconcile started");

        let contenders = self.collect_survivors(board, batch).await?;
        let tally = WinTally::rank(&contenders, &self.spec);
        let promotion = promote_finalists(&tally);
        info!(
            winners = ?promotion.winners,
            losers = ?promotion.losers,
            "batch ranked"
        );

        for name in &promotion.winners {
            board.advance(name, BranchState::WinnerPendingReview, "top win count in batch")?;
            board.set_verdict(name, Verdict::Winner)?;
        }
        for name in &promotion.losers {
            board.advance(name, BranchState::Loser, "outranked in batch")?;
            board.set_verdict(name, Verdict::Loser)?;
        }

        let mut gate_records = Vec::new();
        let mut returned = Vec::new();
        let mut cleared = Vec::new();
        for name in &promotion.winners {
            let findings = self.reviewer.review(name).await?;
            let blocked = findings.iter().any(Finding::blocks);
            let decision = if blocked {
                self.decisions.lock().remove(name)
            } else {
                None
            };

            if blocked {
                match decision {
                    Some(OperatorDecision::MergeAnyway) => {
                        warn!(branch = %name, "operator merged past blockers");
                        cleared.push(name.clone());
                    }
                    Some(OperatorDecision::ReturnForFix) => {
                        board.advance(name, BranchState::Implementing, "returned at quality gate")?;
                        board.set_verdict(name, Verdict::Unevaluated)?;
                        returned.push(name.clone());
                    }
                    Some(OperatorDecision::Close) => {
                        board.advance(name, BranchState::Closed, "closed at quality gate")?;
                        board.set_verdict(name, Verdict::Loser)?;
                    }
                    None => {
                        self.post_findings(name, &findings).await?;
                        board.advance(name, BranchState::Loser, "blockers with no decision")?;
                        board.set_verdict(name, Verdict::Loser)?;
                    }
                }
            } else {
                cleared.push(name.clone());
            }
            gate_records.push(GateRecord {
                branch: name.clone(),
                findings,
                decision,
            });
        }

        let merged = self
            .merge_sequentially(board, &tally, &cleared, trunk)
            .await?;

        let baseline_run = if merged.is_empty() {
            None
        } else {
            let head = trunk.head().await?;
            let request = LaunchRequest::new(batch.baseline.branch.clone(), head.0.clone());
            let queued = self.queue.submit(request).await?;
            info!(run = %queued.run_id, commit = %head, "fresh baseline run submitted");
            Some(queued)
        };

        let closed = self.close_losers(board, batch).await?;
        info!(
            batch = %batch.id,
            merged = merged.len(),
            closed = closed.len(),
            "reconcile finished"
        );

        Ok(ReconcileOutcome {
            tally,
            promotion,
            gate: gate_records,
            merged,
            returned,
            closed,
            baseline_run,
        })
    }

    /// Survivors are the members that reached `Evaluated` with a run
    async fn collect_survivors(
        &self,
        board: &Board,
        batch: &Batch,
    ) -> Result<Vec<Contender>, ReconcileError> {
        let mut contenders = Vec::new();
        for name in &batch.members {
            let Some(branch) = board.get(name) else {
                continue;
            };
            if branch.state != BranchState::Evaluated {
                debug!(branch = %name, state = %branch.state, "not a survivor");
                continue;
            }
            let Some(run_id) = branch.run else {
                continue;
            };
            let run = self.registry.get_run(&run_id).await?;
            contenders.push(Contender::new(name.clone(), run.summary));
        }
        Ok(contenders)
    }

    /// Merge cleared winners one at a time, ranking order, smoke check
    /// between landings
    async fn merge_sequentially(
        &self,
        board: &Board,
        tally: &WinTally,
        cleared: &[String],
        trunk: &mut TrunkWriter,
    ) -> Result<Vec<MergeReceipt>, ReconcileError> {
        let ordered: Vec<String> = tally
            .ranking()
            .into_iter()
            .map(|(name, _)| name)
            .filter(|name| cleared.contains(name))
            .collect();

        let mut merged: Vec<MergeReceipt> = Vec::new();
        for (position, name) in ordered.iter().enumerate() {
            let review = self.ensure_review(board, name, tally).await?;
            match trunk.merge(review.id).await {
                Ok(receipt) => {
                    board.advance(name, BranchState::Merged, "merged by reconciler")?;
                    info!(branch = %name, commit = %receipt.merge_commit, "winner merged");
                    merged.push(receipt);

                    let head = trunk.head().await?;
                    if let SmokeOutcome::Failed { detail } = self.smoke.check(&head).await {
                        warn!(branch = %name, detail, "smoke check failed, halting");
                        return Err(ReconcileError::SmokeCheckFailed {
                            branch: name.clone(),
                            detail,
                        });
                    }
                }
                Err(ForgeError::MergeConflict { branch, files }) => {
                    let report = ConflictReport {
                        branch,
                        files,
                        merged,
                        remaining: ordered[position + 1..].to_vec(),
                    };
                    warn!(branch = %name, files = ?report.files, "merge conflict, halting");
                    return Err(ReconcileError::Conflict(Box::new(report)));
                }
                Err(other) => return Err(other.into()),
            }
        }
        Ok(merged)
    }

    /// Find the branch's open review or open one for the merge
    async fn ensure_review(
        &self,
        board: &Board,
        name: &str,
        tally: &WinTally,
    ) -> Result<Review, ReconcileError> {
        let review = match self.forge.find_review_for_branch(name).await? {
            Some(review) => review,
            None => {
                let body = format!(
                    "Batch winner with {} metric win(s).",
                    tally.wins_for(name)
                );
                self.forge.open_review(name, name, &body).await?
            }
        };
        board.set_review(name, review.id.0)?;
        Ok(review)
    }

    /// Close reviews of losing members and move them to `Closed`
    async fn close_losers(
        &self,
        board: &Board,
        batch: &Batch,
    ) -> Result<Vec<String>, ReconcileError> {
        let mut closed = Vec::new();
        for name in &batch.members {
            let Some(branch) = board.get(name) else {
                continue;
            };
            if branch.state != BranchState::Loser {
                continue;
            }
            if let Some(review) = self.forge.find_review_for_branch(name).await? {
                self.forge
                    .close_review(review.id, "not selected in reconcile")
                    .await?;
            }
            board.advance(name, BranchState::Closed, "lost its batch")?;
            closed.push(name.clone());
        }
        Ok(closed)
    }

    /// Record gate findings on the branch's review, when it has one
    async fn post_findings(&self, name: &str, findings: &[Finding]) -> Result<(), ReconcileError> {
        let Some(review) = self.forge.find_review_for_branch(name).await? else {
            return Ok(());
        };
        let mut body = String::from("Quality gate findings:\n");
        for finding in findings {
            body.push_str(&format!(
                "- [{}] {}{}\n",
                finding.severity.label(),
                finding.message,
                finding
                    .location
                    .as_deref()
                    .map(|l| format!(" ({l})"))
                    .unwrap_or_default()
            ));
        }
        self.forge.comment(review.id, &body).await?;
        Ok(())
    }
}

/// Move merged and closed members of a reconciled batch to `Archived`
pub fn archive_settled(board: &Board, batch: &Batch) -> Result<Vec<String>, BoardError> {
    let mut archived = Vec::new();
    for name in &batch.members {
        let Some(branch) = board.get(name) else {
            continue;
        };
        if matches!(branch.state, BranchState::Merged | BranchState::Closed) {
            board.advance(name, BranchState::Archived, "batch reconciled")?;
            archived.push(name.clone());
        }
    }
    Ok(archived)
}
