//! Drives branches around the lifecycle from idea to verdict
//!
//! The orchestrator owns the board, the active batch and the baseline
//! history, and coordinates the collaborators behind trait objects:
//! the tracking registry, the code host, the launch queue, the
//! workbench and the reconciler. Branch work is independent until
//! reconciliation; the trunk writer claim is the only point of
//! contention.

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::Mutex;
use ratchet_compare::compare;
use ratchet_forge::{CodeHost, MergeReceipt, Trunk};
use ratchet_lifecycle::{Baseline, Batch, BatchId, Board, BoardError, Branch, BranchState};
use ratchet_reconcile::{
    archive_settled, AlwaysHealthy, ApproveAll, BaselineHistory, OperatorDecision,
    ReconcileOutcome, Reconciler, RegressionGuard, RegressionReport, ReviewPass, Rollback,
    RollbackReceipt, SmokeCheck,
};
use ratchet_registry::{LaunchQueue, LaunchRequest, QueuedRun, RunId, RunRegistry, RunState};
use ratchet_verdict::{assess, Disposition, Verdict, VerdictPolicy};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::diagnose::{diagnose, DEFAULT_LAST_STEPS, DEFAULT_LOG_LINES};
use crate::error::OrchestratorError;
use crate::workbench::Workbench;

/// What one poll observed and did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollAction {
    /// Nothing to act on
    None,
    /// The run left the queue and started training
    Started,
    /// The run finished and is held for batch ranking
    Evaluated {
        /// Metrics better than the batch baseline
        improved: usize,
        /// Metrics strictly worse
        regressed: usize,
    },
    /// The run finished without improving anything; dropped before the gate
    EarlyDiscarded,
    /// The run finished but nothing could be compared
    Ambiguous,
    /// A failure was diagnosed and a fixed run relaunched
    FixLaunched {
        /// Fix attempts consumed, this one included
        attempt: u32,
        /// The relaunched run
        run: RunId,
    },
    /// A failure landed after the fix budget was spent
    FixBudgetExhausted,
    /// The run was cancelled; the branch leaves contention
    Discarded,
}

/// One branch's poll result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollReport {
    /// Branch that was polled
    pub branch: String,
    /// Run state observed, when the branch had an observable run
    pub run_state: Option<RunState>,
    /// Branch state after the poll
    pub branch_state: BranchState,
    /// What the poll did
    pub action: PollAction,
}

/// A fresh baseline taking effect, with the regression verdict on it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineAdoption {
    /// The baseline now active
    pub baseline: Baseline,
    /// Regression report against the baseline it replaced, if any
    pub regression: Option<RegressionReport>,
}

/// Coordinates the experiment lifecycle end to end
pub struct Orchestrator {
    config: OrchestratorConfig,
    registry: Arc<dyn RunRegistry>,
    forge: Arc<dyn CodeHost>,
    queue: Arc<dyn LaunchQueue>,
    workbench: Arc<dyn Workbench>,
    board: Board,
    reconciler: Reconciler,
    trunk: Trunk,
    policy: VerdictPolicy,
    batch: Mutex<Option<Batch>>,
    history: Mutex<BaselineHistory>,
    pending_baseline: Mutex<Option<RunId>>,
    last_merged: Mutex<Vec<MergeReceipt>>,
}

impl Orchestrator {
    /// Wire an orchestrator from its collaborators
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<dyn RunRegistry>,
        forge: Arc<dyn CodeHost>,
        queue: Arc<dyn LaunchQueue>,
        workbench: Arc<dyn Workbench>,
        reviewer: Arc<dyn ReviewPass>,
        smoke: Arc<dyn SmokeCheck>,
    ) -> Self {
        let reconciler = Reconciler::new(
            registry.clone(),
            forge.clone(),
            queue.clone(),
            reviewer,
            smoke,
        )
        .with_comparison(config.comparison.clone());
        let trunk = Trunk::new(forge.clone());
        Self {
            config,
            registry,
            forge,
            queue,
            workbench,
            board: Board::new(),
            reconciler,
            trunk,
            policy: VerdictPolicy::default(),
            batch: Mutex::new(None),
            history: Mutex::new(BaselineHistory::new()),
            pending_baseline: Mutex::new(None),
            last_merged: Mutex::new(Vec::new()),
        }
    }

    /// Wire an orchestrator that approves every review and trusts the
    /// trunk (no-op quality gate and smoke check)
    pub fn with_defaults(
        config: OrchestratorConfig,
        registry: Arc<dyn RunRegistry>,
        forge: Arc<dyn CodeHost>,
        queue: Arc<dyn LaunchQueue>,
        workbench: Arc<dyn Workbench>,
    ) -> Self {
        Self::new(
            config,
            registry,
            forge,
            queue,
            workbench,
            Arc::new(ApproveAll),
            Arc::new(AlwaysHealthy),
        )
    }

    /// With a verdict policy other than the default
    #[must_use]
    pub fn with_verdict_policy(mut self, policy: VerdictPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The lifecycle board
    #[inline]
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The orchestrator's configuration
    #[inline]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// The open batch, if one exists
    #[must_use]
    pub fn batch(&self) -> Option<Batch> {
        self.batch.lock().clone()
    }

    /// The active baseline, if one has been established
    #[must_use]
    pub fn baseline(&self) -> Option<Baseline> {
        self.history.lock().current().cloned()
    }

    /// The submitted baseline run not yet adopted, if any
    #[must_use]
    pub fn pending_baseline(&self) -> Option<RunId> {
        self.pending_baseline.lock().clone()
    }

    /// Record an operator decision for a winner held at the quality gate
    pub fn record_decision(&self, branch: impl Into<String>, decision: OperatorDecision) {
        self.reconciler.record_decision(branch, decision);
    }

    /// Designate a finished trunk run as the active baseline.
    ///
    /// The first baseline comes from a run launched outside the system;
    /// later ones arrive through [`Orchestrator::adopt_baseline`].
    pub async fn establish_baseline(
        &self,
        run_id: impl Into<RunId>,
    ) -> Result<Baseline, OrchestratorError> {
        let run_id = run_id.into();
        let run = self.registry.get_run(&run_id).await?;
        if run.state != RunState::Finished {
            return Err(OrchestratorError::NotFinished {
                run: run_id,
                state: run.state,
            });
        }
        let commit = match run.commit.clone() {
            Some(commit) => commit,
            None => self.forge.trunk_head().await?.0,
        };
        let baseline = Baseline::new(
            run.id.clone(),
            self.config.trunk_branch.clone(),
            commit,
            run.summary.clone(),
        );
        self.history.lock().establish(baseline.clone());
        Ok(baseline)
    }

    /// Open a batch of candidates against the active baseline.
    ///
    /// An already open batch is abandoned; its branches keep whatever
    /// state they reached.
    pub fn open_batch(&self) -> Result<BatchId, OrchestratorError> {
        let baseline = self
            .history
            .lock()
            .current()
            .cloned()
            .ok_or(OrchestratorError::NoBaseline)?;
        let batch = Batch::new(baseline);
        let id = batch.id;
        if let Some(old) = self.batch.lock().replace(batch) {
            warn!(batch = %old.id, "open batch abandoned");
        }
        info!(batch = %id, "batch opened");
        Ok(id)
    }

    /// Accept an experiment idea into the open batch.
    ///
    /// Registers the branch and moves it straight to implementation.
    pub fn accept_idea(
        &self,
        branch: impl Into<String>,
        idea: impl Into<String>,
    ) -> Result<(), OrchestratorError> {
        let name = branch.into();
        let mut guard = self.batch.lock();
        let batch = guard.as_mut().ok_or(OrchestratorError::NoBatch)?;
        self.board
            .register(Branch::new(name.as_str()).with_idea(idea))?;
        self.board
            .advance(&name, BranchState::Implementing, "idea accepted")?;
        batch.add_member(&name);
        info!(branch = %name, batch = %batch.id, "idea accepted");
        Ok(())
    }

    /// Implement the branch's idea and submit its run.
    ///
    /// The workbench pushes the change; the resulting commit goes to
    /// the launch queue and the run id lands on the board.
    pub async fn launch(&self, branch: &str) -> Result<QueuedRun, OrchestratorError> {
        let current = self.get_branch(branch)?;
        if current.state != BranchState::Implementing {
            return Err(OrchestratorError::NotLaunchable {
                branch: branch.to_string(),
                state: current.state,
            });
        }
        let idea = current.idea.clone().unwrap_or_else(|| branch.to_string());
        let commit = self.workbench.implement(branch, &idea).await?;
        let queued = self
            .queue
            .submit(LaunchRequest::new(branch, commit.0))
            .await?;
        self.board.record_run(branch, queued.run_id.clone())?;
        self.board
            .advance(branch, BranchState::Launched, "run submitted")?;
        info!(branch, run = %queued.run_id, "branch launched");
        Ok(queued)
    }

    /// Observe one branch's run and advance the lifecycle accordingly.
    ///
    /// Finished runs are compared against the batch baseline and either
    /// held for ranking or discarded early. Failed and crashed runs are
    /// diagnosed and relaunched while fix budget remains. Branches that
    /// are not in flight are left untouched.
    pub async fn poll(&self, branch: &str) -> Result<PollReport, OrchestratorError> {
        let current = self.get_branch(branch)?;
        if !matches!(current.state, BranchState::Launched | BranchState::Running) {
            return Ok(PollReport {
                branch: branch.to_string(),
                run_state: None,
                branch_state: current.state,
                action: PollAction::None,
            });
        }
        let run_id = current
            .run
            .clone()
            .ok_or_else(|| OrchestratorError::NoRun(branch.to_string()))?;
        let baseline = self
            .batch
            .lock()
            .as_ref()
            .map(|b| b.baseline.clone())
            .ok_or(OrchestratorError::NoBatch)?;

        let run = self.registry.get_run(&run_id).await?;
        let comparison = compare(&run.summary, &baseline.summary, &self.config.comparison);
        let disposition = assess(run.state, &comparison, &self.policy);
        debug!(branch, run = %run_id, state = %run.state, ?disposition, "polled");

        let action = match disposition {
            Disposition::InFlight => {
                if run.state == RunState::Running && current.state == BranchState::Launched {
                    self.board
                        .advance(branch, BranchState::Running, "run started")?;
                    PollAction::Started
                } else {
                    PollAction::None
                }
            }
            Disposition::Evaluated => {
                let improved = comparison.improved_count();
                let regressed = comparison.regressed_count();
                self.mark_finished(branch)?;
                self.board.advance(
                    branch,
                    BranchState::Evaluated,
                    &format!("{improved} of {} metrics improved", comparison.deltas.len()),
                )?;
                self.board.set_verdict(branch, disposition.verdict())?;
                PollAction::Evaluated {
                    improved,
                    regressed,
                }
            }
            Disposition::EarlyDiscard => {
                self.mark_finished(branch)?;
                self.board
                    .advance(branch, BranchState::Evaluated, "no metric improved")?;
                self.board
                    .advance(branch, BranchState::Loser, "early discard")?;
                self.board.set_verdict(branch, disposition.verdict())?;
                info!(branch, "early discard");
                PollAction::EarlyDiscarded
            }
            Disposition::Ambiguous => {
                self.mark_finished(branch)?;
                self.board.advance(
                    branch,
                    BranchState::Evaluated,
                    "nothing comparable against the baseline",
                )?;
                self.board.set_verdict(branch, disposition.verdict())?;
                warn!(branch, run = %run_id, "no comparable metrics");
                PollAction::Ambiguous
            }
            Disposition::NeedsFix => self.handle_failure(branch, &current, &run_id, run.state).await?,
            Disposition::Discarded => {
                if current.state != BranchState::Cancelled {
                    self.board
                        .advance(branch, BranchState::Cancelled, "run cancelled")?;
                }
                self.board
                    .advance(branch, BranchState::Loser, "cancelled before evaluation")?;
                self.board.set_verdict(branch, disposition.verdict())?;
                PollAction::Discarded
            }
        };

        let after = self.get_branch(branch)?;
        Ok(PollReport {
            branch: branch.to_string(),
            run_state: Some(run.state),
            branch_state: after.state,
            action,
        })
    }

    /// Poll every member of the open batch concurrently
    pub async fn poll_all(&self) -> Result<Vec<PollReport>, OrchestratorError> {
        let members = self
            .batch
            .lock()
            .as_ref()
            .map(|b| b.members.clone())
            .ok_or(OrchestratorError::NoBatch)?;
        let polls = members.iter().map(|name| self.poll(name));
        join_all(polls).await.into_iter().collect()
    }

    /// Reconcile the open batch if its gate has released.
    ///
    /// Returns `Ok(None)` while members are still unsettled. On success
    /// the submitted baseline run is tracked for
    /// [`Orchestrator::adopt_baseline`].
    pub async fn reconcile_if_ready(
        &self,
    ) -> Result<Option<ReconcileOutcome>, OrchestratorError> {
        let batch = self.batch().ok_or(OrchestratorError::NoBatch)?;
        let gate = self.board.gate_status(&batch);
        if !gate.ready {
            debug!(batch = %batch.id, pending = ?gate.pending, "gate still held");
            return Ok(None);
        }
        let mut writer = self.trunk.try_writer()?;
        let outcome = self
            .reconciler
            .reconcile(&self.board, &batch, &mut writer)
            .await?;
        if let Some(queued) = &outcome.baseline_run {
            *self.pending_baseline.lock() = Some(queued.run_id.clone());
        }
        *self.last_merged.lock() = outcome.merged.clone();
        Ok(Some(outcome))
    }

    /// Adopt the pending baseline run once it finishes.
    ///
    /// Returns `Ok(None)` while no baseline run is pending or the run is
    /// still in flight. A finished run becomes the active baseline; a
    /// regression against the one it replaces is reported and filed as
    /// an issue, never reverted automatically.
    pub async fn adopt_baseline(&self) -> Result<Option<BaselineAdoption>, OrchestratorError> {
        let Some(run_id) = self.pending_baseline.lock().clone() else {
            return Ok(None);
        };
        let run = self.registry.get_run(&run_id).await?;
        if !run.state.is_terminal() {
            return Ok(None);
        }
        if run.state != RunState::Finished {
            self.pending_baseline.lock().take();
            return Err(OrchestratorError::BaselineRunLost {
                run: run_id,
                state: run.state,
            });
        }
        let commit = match run.commit.clone() {
            Some(commit) => commit,
            None => self.forge.trunk_head().await?.0,
        };
        let baseline = Baseline::new(
            run.id.clone(),
            self.config.trunk_branch.clone(),
            commit,
            run.summary.clone(),
        );
        let merged = self.last_merged.lock().clone();
        let regression = {
            let mut history = self.history.lock();
            let report = history.current().and_then(|previous| {
                RegressionGuard::check(&baseline, previous, &merged, &self.config.comparison)
            });
            history.establish(baseline.clone());
            report
        };
        self.pending_baseline.lock().take();
        if let Some(report) = &regression {
            let issue = report.file_issue(self.forge.as_ref()).await?;
            warn!(issue = issue.number, "regression filed");
        }
        Ok(Some(BaselineAdoption {
            baseline,
            regression,
        }))
    }

    /// Roll a regressed reconcile back off the trunk.
    ///
    /// Only ever run on an operator's say-so, with the report produced
    /// by [`Orchestrator::adopt_baseline`].
    pub async fn roll_back(
        &mut self,
        report: &RegressionReport,
    ) -> Result<RollbackReceipt, OrchestratorError> {
        let mut writer = self.trunk.try_writer()?;
        let receipt = Rollback::execute(report, &mut writer, self.history.get_mut()).await?;
        Ok(receipt)
    }

    /// Archive the open batch's merged and closed branches
    pub fn archive_batch(&self) -> Result<Vec<String>, OrchestratorError> {
        let batch = self.batch().ok_or(OrchestratorError::NoBatch)?;
        Ok(archive_settled(&self.board, &batch)?)
    }

    fn get_branch(&self, branch: &str) -> Result<Branch, OrchestratorError> {
        self.board
            .get(branch)
            .ok_or_else(|| BoardError::UnknownBranch(branch.to_string()).into())
    }

    /// First observation of a terminal run may come straight from Launched.
    fn mark_finished(&self, branch: &str) -> Result<(), OrchestratorError> {
        self.board
            .advance(branch, BranchState::Finished, "run finished")?;
        Ok(())
    }

    async fn handle_failure(
        &self,
        branch: &str,
        before: &Branch,
        run_id: &RunId,
        state: RunState,
    ) -> Result<PollAction, OrchestratorError> {
        let broke = BranchState::from_run_state(state);
        self.board
            .advance(branch, broke, &format!("run {broke}"))?;
        if before.fix_attempts >= self.config.max_fix_attempts {
            self.board
                .advance(branch, BranchState::Loser, "fix budget exhausted")?;
            self.board.set_verdict(branch, Verdict::Loser)?;
            warn!(
                branch,
                attempts = before.fix_attempts,
                "fix budget exhausted"
            );
            return Ok(PollAction::FixBudgetExhausted);
        }
        let attempt = self.board.begin_fix(branch)?;
        self.board.advance(
            branch,
            BranchState::Implementing,
            &format!("fix attempt {attempt}"),
        )?;
        let diagnosis =
            diagnose(self.registry.as_ref(), run_id, DEFAULT_LOG_LINES, DEFAULT_LAST_STEPS)
                .await?;
        let commit = self.workbench.apply_fix(branch, &diagnosis).await?;
        let queued = self
            .queue
            .submit(LaunchRequest::new(branch, commit.0))
            .await?;
        self.board.record_run(branch, queued.run_id.clone())?;
        self.board
            .advance(branch, BranchState::Launched, "fix relaunched")?;
        info!(branch, attempt, run = %queued.run_id, "fix relaunched");
        Ok(PollAction::FixLaunched {
            attempt,
            run: queued.run_id,
        })
    }
}
