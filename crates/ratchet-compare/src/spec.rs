//! Comparison specification: which metrics, and which way they improve

use crate::direction::Direction;
use indexmap::IndexMap;
use ratchet_registry::MetricMap;
use serde::{Deserialize, Serialize};

/// What to compare and how
///
/// With no explicit metric list the candidate's summary keys are used in
/// insertion order. Direction overrides always win over the name heuristic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComparisonSpec {
    /// Primary metrics; `None` auto-detects from the candidate summary
    pub metrics: Option<Vec<String>>,
    /// Explicit direction overrides keyed by metric name
    #[serde(default)]
    pub overrides: IndexMap<String, Direction>,
}

impl ComparisonSpec {
    /// Auto-detecting spec with no overrides
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With an explicit primary metric list
    #[inline]
    #[must_use]
    pub fn with_metrics(mut self, metrics: Vec<String>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// With a direction override for one metric
    #[inline]
    #[must_use]
    pub fn with_override(mut self, metric: impl Into<String>, direction: Direction) -> Self {
        self.overrides.insert(metric.into(), direction);
        self
    }

    /// Direction for a metric: override first, heuristic otherwise
    #[must_use]
    pub fn direction_for(&self, metric: &str) -> Direction {
        self.overrides
            .get(metric)
            .copied()
            .unwrap_or_else(|| Direction::for_metric(metric))
    }

    /// Metric names to compare, given the candidate summary
    #[must_use]
    pub fn metric_names(&self, candidate: &MetricMap) -> Vec<String> {
        match &self.metrics {
            Some(explicit) => explicit.clone(),
            None => candidate.keys().cloned().collect(),
        }
    }

    /// Metric names across several summaries, first-seen order
    #[must_use]
    pub fn metric_names_across(&self, summaries: &[&MetricMap]) -> Vec<String> {
        if let Some(explicit) = &self.metrics {
            return explicit.clone();
        }
        let mut names: Vec<String> = Vec::new();
        for summary in summaries {
            for key in summary.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }
        names
    }
}
