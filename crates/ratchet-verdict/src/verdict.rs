//! Verdicts and run-observation dispositions

use ratchet_compare::ComparisonResult;
use ratchet_registry::RunState;
use serde::{Deserialize, Serialize};

/// Standing of a branch relative to the baseline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    /// No run has produced evidence yet
    #[default]
    Unevaluated,
    /// Evidence exists but is not decisive yet
    Inconclusive,
    /// Selected for merging
    Winner,
    /// Out of contention
    Loser,
}

impl Verdict {
    /// Whether the verdict is settled
    #[inline]
    #[must_use]
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Winner | Self::Loser)
    }

    /// Lowercase label for tables
    #[inline]
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unevaluated => "unevaluated",
            Self::Inconclusive => "inconclusive",
            Self::Winner => "winner",
            Self::Loser => "loser",
        }
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What to do with a branch after observing its run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Still queued or running; observe again later
    InFlight,
    /// Failed or crashed; diagnose, then fix or demote
    NeedsFix,
    /// Cancelled before finishing; out of contention without evaluation
    Discarded,
    /// Finished and worse-or-equal on every primary metric; drop now
    EarlyDiscard,
    /// Finished with a usable comparison; hold for batch ranking
    Evaluated,
    /// Finished but nothing could be compared; needs operator attention
    Ambiguous,
}

impl Disposition {
    /// Verdict implied by this disposition
    #[must_use]
    pub fn verdict(&self) -> Verdict {
        match self {
            Self::InFlight | Self::Evaluated | Self::Ambiguous => Verdict::Inconclusive,
            Self::NeedsFix => Verdict::Unevaluated,
            Self::Discarded | Self::EarlyDiscard => Verdict::Loser,
        }
    }
}

/// Knobs for verdict assignment
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct VerdictPolicy {
    /// Drop finished branches that improve nothing, without waiting for
    /// the batch
    pub early_discard_enabled: bool,
}

impl Default for VerdictPolicy {
    fn default() -> Self {
        Self {
            early_discard_enabled: true,
        }
    }
}

/// Decide what to do with a branch given its latest run observation
///
/// Failed and crashed runs never receive a verdict here; they go to the
/// fix path. Early discard is conservative: it requires every requested
/// metric to have been compared (nothing skipped) and none improved.
#[must_use]
pub fn assess(
    state: RunState,
    comparison: &ComparisonResult,
    policy: &VerdictPolicy,
) -> Disposition {
    match state {
        RunState::Queued | RunState::Running => Disposition::InFlight,
        RunState::Failed | RunState::Crashed => Disposition::NeedsFix,
        RunState::Cancelled => Disposition::Discarded,
        RunState::Finished => {
            if comparison.is_empty() {
                return Disposition::Ambiguous;
            }
            let fully_compared = comparison.skipped.is_empty();
            if policy.early_discard_enabled && fully_compared && comparison.none_improved() {
                Disposition::EarlyDiscard
            } else {
                Disposition::Evaluated
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_compare::{compare, ComparisonSpec};
    use ratchet_registry::MetricMap;

    fn summary(pairs: &[(&str, f64)]) -> MetricMap {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    fn compared(candidate: &[(&str, f64)], baseline: &[(&str, f64)]) -> ComparisonResult {
        compare(
            &summary(candidate),
            &summary(baseline),
            &ComparisonSpec::new(),
        )
    }

    #[test]
    fn running_branches_stay_in_flight() {
        let result = compared(&[("loss", 0.5)], &[("loss", 0.4)]);
        assert_eq!(
            assess(RunState::Running, &result, &VerdictPolicy::default()),
            Disposition::InFlight
        );
        assert_eq!(Disposition::InFlight.verdict(), Verdict::Inconclusive);
    }

    #[test]
    fn failures_route_to_the_fix_path() {
        let empty = ComparisonResult::default();
        assert_eq!(
            assess(RunState::Failed, &empty, &VerdictPolicy::default()),
            Disposition::NeedsFix
        );
        assert_eq!(
            assess(RunState::Crashed, &empty, &VerdictPolicy::default()),
            Disposition::NeedsFix
        );
        assert_eq!(Disposition::NeedsFix.verdict(), Verdict::Unevaluated);
    }

    #[test]
    fn cancelled_is_discarded_without_evaluation() {
        let empty = ComparisonResult::default();
        assert_eq!(
            assess(RunState::Cancelled, &empty, &VerdictPolicy::default()),
            Disposition::Discarded
        );
        assert_eq!(Disposition::Discarded.verdict(), Verdict::Loser);
    }

    #[test]
    fn worse_everywhere_is_discarded_early() {
        let result = compared(
            &[("loss", 0.50), ("accuracy", 0.85)],
            &[("loss", 0.42), ("accuracy", 0.91)],
        );
        assert_eq!(
            assess(RunState::Finished, &result, &VerdictPolicy::default()),
            Disposition::EarlyDiscard
        );
    }

    #[test]
    fn equal_everywhere_is_also_discarded_early() {
        let result = compared(&[("loss", 0.42)], &[("loss", 0.42)]);
        assert_eq!(
            assess(RunState::Finished, &result, &VerdictPolicy::default()),
            Disposition::EarlyDiscard
        );
    }

    #[test]
    fn a_skipped_metric_suppresses_early_discard() {
        // Worse on loss, but accuracy was never compared: keep the branch.
        let result = compared(
            &[("loss", 0.50), ("accuracy", 0.95)],
            &[("loss", 0.42)],
        );
        assert_eq!(
            assess(RunState::Finished, &result, &VerdictPolicy::default()),
            Disposition::Evaluated
        );
    }

    #[test]
    fn any_improvement_survives_to_the_batch() {
        let result = compared(
            &[("loss", 0.38), ("accuracy", 0.85)],
            &[("loss", 0.42), ("accuracy", 0.91)],
        );
        assert_eq!(
            assess(RunState::Finished, &result, &VerdictPolicy::default()),
            Disposition::Evaluated
        );
    }

    #[test]
    fn nothing_comparable_is_ambiguous() {
        let result = compared(&[("bleu", 30.0)], &[("loss", 0.42)]);
        assert_eq!(
            assess(RunState::Finished, &result, &VerdictPolicy::default()),
            Disposition::Ambiguous
        );
    }

    #[test]
    fn early_discard_can_be_disabled() {
        let policy = VerdictPolicy {
            early_discard_enabled: false,
        };
        let result = compared(&[("loss", 0.50)], &[("loss", 0.42)]);
        assert_eq!(
            assess(RunState::Finished, &result, &policy),
            Disposition::Evaluated
        );
    }
}
