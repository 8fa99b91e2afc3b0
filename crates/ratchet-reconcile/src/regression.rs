//! Baseline regression detection after a reconcile
//!
//! The guard only reports. Reverting is [`Rollback::execute`]'s job and
//! always an explicit call: a regressed trunk stays regressed until an
//! operator acts on the report.
//!
//! [`Rollback::execute`]: crate::rollback::Rollback::execute

use ratchet_compare::{compare, ComparisonSpec, MetricDelta};
use ratchet_forge::{CodeHost, ForgeError, Issue, MergeReceipt};
use ratchet_lifecycle::Baseline;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// What the guard recommends doing about a regression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Remedy {
    /// Revert the batch's merge commits and reinstate the prior baseline
    Rollback,
    /// Keep the trunk; the regression was judged tolerable
    Tolerate,
}

/// A fresh baseline coming out worse than the one it replaced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionReport {
    /// Merges that produced the new trunk, in landing order
    pub merged: Vec<MergeReceipt>,
    /// Metrics strictly worse than the previous baseline
    pub regressed: Vec<MetricDelta>,
    /// The regressing baseline
    pub new_baseline: Baseline,
    /// The baseline it was compared against
    pub previous: Baseline,
    /// Recommended response
    pub recommended: Remedy,
}

impl RegressionReport {
    /// Issue title naming the offending branches
    #[must_use]
    pub fn title(&self) -> String {
        let branches: Vec<&str> = self.merged.iter().map(|r| r.branch.as_str()).collect();
        format!("Baseline regression after merging {}", branches.join(", "))
    }

    /// Issue body: regressed metrics, merged branches, recommendation
    #[must_use]
    pub fn render(&self) -> String {
        let mut body = format!(
            "Baseline run {} regressed against {}.\n\nRegressed metrics:\n",
            self.new_baseline.run_id, self.previous.run_id
        );
        for delta in &self.regressed {
            body.push_str(&format!(
                "- {}: {:.4} -> {:.4} ({:+.4}, {})\n",
                delta.metric,
                delta.baseline,
                delta.candidate,
                delta.delta,
                delta.direction.label()
            ));
        }
        body.push_str("\nMerged branches:\n");
        for receipt in &self.merged {
            body.push_str(&format!("- {} ({})\n", receipt.branch, receipt.merge_commit));
        }
        match self.recommended {
            Remedy::Rollback => {
                body.push_str("\nRecommended: roll back the merge commits and reinstate the previous baseline.\n");
            }
            Remedy::Tolerate => {
                body.push_str("\nRecommended: keep the trunk; regression judged tolerable.\n");
            }
        }
        body
    }

    /// File the report as a `regression`-labelled issue
    pub async fn file_issue(&self, forge: &dyn CodeHost) -> Result<Issue, ForgeError> {
        forge
            .create_issue(&self.title(), &self.render(), &["regression".to_string()])
            .await
    }
}

/// Compares a fresh baseline against the one it replaced
#[derive(Debug, Clone, Copy, Default)]
pub struct RegressionGuard;

impl RegressionGuard {
    /// Check a fresh baseline, reporting iff any metric came out worse.
    ///
    /// Uses the same comparator as candidate evaluation, so direction
    /// handling and skip behavior are identical.
    #[must_use]
    pub fn check(
        new_baseline: &Baseline,
        previous: &Baseline,
        merged: &[MergeReceipt],
        spec: &ComparisonSpec,
    ) -> Option<RegressionReport> {
        let comparison = compare(&new_baseline.summary, &previous.summary, spec);
        let regressed: Vec<MetricDelta> = comparison
            .deltas
            .iter()
            .filter(|d| d.regressed())
            .cloned()
            .collect();
        if regressed.is_empty() {
            return None;
        }
        warn!(
            run = %new_baseline.run_id,
            metrics = ?regressed.iter().map(|d| d.metric.as_str()).collect::<Vec<_>>(),
            "baseline regression detected"
        );
        Some(RegressionReport {
            merged: merged.to_vec(),
            regressed,
            new_baseline: new_baseline.clone(),
            previous: previous.clone(),
            recommended: Remedy::Rollback,
        })
    }
}
