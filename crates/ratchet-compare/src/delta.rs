//! Pairwise comparison of a candidate summary against a baseline

use crate::direction::Direction;
use crate::spec::ComparisonSpec;
use ratchet_registry::MetricMap;
use serde::{Deserialize, Serialize};

/// One compared metric
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricDelta {
    /// Metric name
    pub metric: String,
    /// Candidate value
    pub candidate: f64,
    /// Baseline value
    pub baseline: f64,
    /// Candidate minus baseline
    pub delta: f64,
    /// Direction the metric improves in
    pub direction: Direction,
    /// Whether the delta is an improvement
    pub improved: bool,
}

impl MetricDelta {
    /// Whether the candidate is strictly worse on this metric
    #[inline]
    #[must_use]
    pub fn regressed(&self) -> bool {
        !self.improved && self.delta != 0.0
    }
}

/// Why a metric was left out of a comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Candidate summary has no value for the metric
    MissingInCandidate,
    /// Baseline summary has no value for the metric
    MissingInBaseline,
    /// One side logged NaN or infinity
    NotFinite,
}

/// A metric excluded from a comparison, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedMetric {
    /// Metric name
    pub metric: String,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// Outcome of comparing one candidate against one baseline
///
/// Derived data: recomputing from the same summaries always yields the same
/// result. Missing metrics are skipped, never errors.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonResult {
    /// Compared metrics, in spec order
    pub deltas: Vec<MetricDelta>,
    /// Metrics left out, with reasons
    pub skipped: Vec<SkippedMetric>,
}

impl ComparisonResult {
    /// Number of improved metrics
    #[must_use]
    pub fn improved_count(&self) -> usize {
        self.deltas.iter().filter(|d| d.improved).count()
    }

    /// Number of strictly regressed metrics
    #[must_use]
    pub fn regressed_count(&self) -> usize {
        self.deltas.iter().filter(|d| d.regressed()).count()
    }

    /// Whether nothing could be compared
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    /// Whether every compared metric came out worse or equal
    #[must_use]
    pub fn none_improved(&self) -> bool {
        self.deltas.iter().all(|d| !d.improved)
    }

    /// Look up one compared metric
    #[must_use]
    pub fn get(&self, metric: &str) -> Option<&MetricDelta> {
        self.deltas.iter().find(|d| d.metric == metric)
    }

    /// Whether a requested metric was skipped
    #[must_use]
    pub fn was_skipped(&self, metric: &str) -> bool {
        self.skipped.iter().any(|s| s.metric == metric)
    }
}

/// Compare a candidate summary against a baseline summary
#[must_use]
pub fn compare(
    candidate: &MetricMap,
    baseline: &MetricMap,
    spec: &ComparisonSpec,
) -> ComparisonResult {
    let mut result = ComparisonResult::default();
    for metric in spec.metric_names(candidate) {
        let (cand, base) = match (candidate.get(&metric), baseline.get(&metric)) {
            (Some(c), Some(b)) => (*c, *b),
            (None, _) => {
                result.skipped.push(SkippedMetric {
                    metric,
                    reason: SkipReason::MissingInCandidate,
                });
                continue;
            }
            (_, None) => {
                result.skipped.push(SkippedMetric {
                    metric,
                    reason: SkipReason::MissingInBaseline,
                });
                continue;
            }
        };
        if !cand.is_finite() || !base.is_finite() {
            result.skipped.push(SkippedMetric {
                metric,
                reason: SkipReason::NotFinite,
            });
            continue;
        }
        let direction = spec.direction_for(&metric);
        let delta = cand - base;
        result.deltas.push(MetricDelta {
            metric,
            candidate: cand,
            baseline: base,
            delta,
            direction,
            improved: direction.improved(delta),
        });
    }
    result
}
