//! History-preserving rollback of a regressed reconcile

use ratchet_forge::{CommitId, TrunkWriter};
use ratchet_lifecycle::Baseline;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ReconcileError;
use crate::regression::RegressionReport;

/// Every baseline that has ever been active, in establishment order.
///
/// The top entry is the active baseline. Reinstating pushes a copy of
/// the previous entry instead of popping, so the rolled-back baseline
/// stays in the record and a rollback of the rollback restores it
/// exactly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineHistory {
    entries: Vec<Baseline>,
}

impl BaselineHistory {
    /// Empty history; no baseline is active yet
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a baseline the active one
    pub fn establish(&mut self, baseline: Baseline) {
        info!(run = %baseline.run_id, commit = %baseline.commit, "baseline established");
        self.entries.push(baseline);
    }

    /// The active baseline
    #[must_use]
    pub fn current(&self) -> Option<&Baseline> {
        self.entries.last()
    }

    /// The baseline active before the current one
    #[must_use]
    pub fn previous(&self) -> Option<&Baseline> {
        self.entries.len().checked_sub(2).map(|i| &self.entries[i])
    }

    /// Number of establishments, reinstates included
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no baseline was ever established
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// What a rollback did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackReceipt {
    /// Revert commits created, newest merge first
    pub reverts: Vec<CommitId>,
    /// Baseline active after the rollback
    pub reinstated: Baseline,
    /// The regressing baseline, retained in history
    pub rolled_back: Baseline,
    /// Branches whose merges were undone
    pub branches: Vec<String>,
}

/// Rolls a regressed reconcile back off the trunk
#[derive(Debug, Clone, Copy, Default)]
pub struct Rollback;

impl Rollback {
    /// Revert the report's merge commits and reinstate the previous
    /// baseline.
    ///
    /// Reverts land newest merge first so each one applies onto the
    /// state the merge left behind. History moves forward only; the
    /// merges stay in the trunk record under their revert commits, and
    /// the receipt names the branches so each can be re-attempted on
    /// its own.
    pub async fn execute(
        report: &RegressionReport,
        trunk: &mut TrunkWriter,
        history: &mut BaselineHistory,
    ) -> Result<RollbackReceipt, ReconcileError> {
        let metrics: Vec<&str> = report.regressed.iter().map(|d| d.metric.as_str()).collect();
        let mut reverts = Vec::new();
        let mut branches = Vec::new();
        for receipt in report.merged.iter().rev() {
            let reason = format!(
                "roll back {}: baseline regressed on {}",
                receipt.branch,
                metrics.join(", ")
            );
            reverts.push(trunk.revert(&receipt.merge_commit, &reason).await?);
            branches.push(receipt.branch.clone());
        }

        history.establish(report.previous.clone());
        info!(
            reinstated = %report.previous.run_id,
            rolled_back = %report.new_baseline.run_id,
            reverts = reverts.len(),
            "rollback executed"
        );
        Ok(RollbackReceipt {
            reverts,
            reinstated: report.previous.clone(),
            rolled_back: report.new_baseline.clone(),
            branches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::RegressionGuard;
    use pretty_assertions::assert_eq;
    use ratchet_compare::ComparisonSpec;
    use ratchet_forge::{CodeHost, MemoryForge, Trunk};
    use ratchet_registry::MetricMap;
    use std::sync::Arc;

    fn summary(pairs: &[(&str, f64)]) -> MetricMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn baseline(run: &str, commit: impl Into<String>, pairs: &[(&str, f64)]) -> Baseline {
        Baseline::new(run, "main", commit, summary(pairs))
    }

    #[test]
    fn history_tracks_current_and_previous() {
        let mut history = BaselineHistory::new();
        assert!(history.current().is_none());

        history.establish(baseline("base-1", "aaaa", &[("loss", 0.42)]));
        history.establish(baseline("base-2", "bbbb", &[("loss", 0.45)]));
        assert_eq!(history.current().unwrap().run_id.0, "base-2");
        assert_eq!(history.previous().unwrap().run_id.0, "base-1");
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn rollback_reverts_merges_and_reinstates() {
        let forge = Arc::new(MemoryForge::new());
        let a = forge.open_review("tune-lr", "a", "").await.unwrap();
        let b = forge.open_review("wider-ffn", "b", "").await.unwrap();
        let first = forge.merge(a.id).await.unwrap();
        let second = forge.merge(b.id).await.unwrap();

        let mut history = BaselineHistory::new();
        let previous = baseline("base-1", "m000000", &[("loss", 0.40)]);
        let regressing = baseline("base-2", second.merge_commit.0.clone(), &[("loss", 0.45)]);
        history.establish(previous.clone());
        history.establish(regressing.clone());

        let report = RegressionGuard::check(
            &regressing,
            &previous,
            &[first.clone(), second.clone()],
            &ComparisonSpec::new(),
        )
        .unwrap();

        let trunk = Trunk::new(Arc::clone(&forge) as Arc<dyn CodeHost>);
        let mut writer = trunk.try_writer().unwrap();
        let receipt = Rollback::execute(&report, &mut writer, &mut history)
            .await
            .unwrap();

        // two reverts appended, newest merge undone first
        assert_eq!(receipt.reverts.len(), 2);
        assert_eq!(receipt.branches, vec!["wider-ffn".to_string(), "tune-lr".to_string()]);
        let trunk_log = forge.trunk_history();
        assert_eq!(trunk_log.len(), 5); // genesis + 2 merges + 2 reverts
        assert_eq!(trunk_log.last(), receipt.reverts.last());

        // previous baseline is active again; the regressing one is retained
        assert_eq!(history.current().unwrap().run_id.0, "base-1");
        assert_eq!(history.previous().unwrap().run_id.0, "base-2");
        assert_eq!(history.len(), 3);
    }

    #[tokio::test]
    async fn rollback_of_rollback_restores_exactly() {
        let mut history = BaselineHistory::new();
        let older = baseline("base-1", "aaaa", &[("loss", 0.40)]);
        let newer = baseline("base-2", "bbbb", &[("loss", 0.45)]);
        history.establish(older.clone());
        history.establish(newer.clone());

        // first rollback reinstates base-1
        history.establish(older.clone());
        assert_eq!(history.current().unwrap().run_id.0, "base-1");
        assert_eq!(history.previous().unwrap().run_id.0, "base-2");

        // rolling that back reinstates base-2 with its original numbers
        history.establish(history.previous().cloned().unwrap());
        let restored = history.current().unwrap();
        assert_eq!(restored.run_id.0, "base-2");
        assert_eq!(restored.summary["loss"], 0.45);
    }
}
