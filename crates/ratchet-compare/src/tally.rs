//! Win counting across several branches at once

use crate::direction::Direction;
use crate::spec::ComparisonSpec;
use indexmap::IndexMap;
use ratchet_registry::MetricMap;
use serde::{Deserialize, Serialize};

/// One branch entering a multi-way comparison
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contender {
    /// Branch name
    pub name: String,
    /// Summary metrics of the branch's run
    pub summary: MetricMap,
}

impl Contender {
    /// Create a contender
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, summary: MetricMap) -> Self {
        Self {
            name: name.into(),
            summary,
        }
    }
}

/// Best holder of one metric, if anyone holds it outright
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricBest {
    /// Metric name
    pub metric: String,
    /// Direction the metric improves in
    pub direction: Direction,
    /// Unique best branch; `None` on a tie or when nobody logged it
    pub best: Option<String>,
}

/// Win counts across contenders
///
/// A branch wins a metric only by being strictly better than every other
/// branch that logged it; ties score for nobody.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WinTally {
    /// Wins per branch, in contender order
    pub wins: IndexMap<String, usize>,
    /// Per-metric best markers, in metric order
    pub bests: Vec<MetricBest>,
}

impl WinTally {
    /// Count wins across the given contenders
    #[must_use]
    pub fn rank(contenders: &[Contender], spec: &ComparisonSpec) -> Self {
        let mut tally = Self::default();
        for contender in contenders {
            tally.wins.insert(contender.name.clone(), 0);
        }

        let summaries: Vec<&MetricMap> = contenders.iter().map(|c| &c.summary).collect();
        for metric in spec.metric_names_across(&summaries) {
            let direction = spec.direction_for(&metric);
            let holders: Vec<(&str, f64)> = contenders
                .iter()
                .filter_map(|c| {
                    c.summary
                        .get(&metric)
                        .filter(|v| v.is_finite())
                        .map(|v| (c.name.as_str(), *v))
                })
                .collect();

            let best = holders.iter().fold(None::<(&str, f64)>, |acc, &(n, v)| {
                match acc {
                    Some((_, best_v)) if !direction.beats(v, best_v) => acc,
                    _ => Some((n, v)),
                }
            });

            let unique_best = best.and_then(|(name, value)| {
                let tied = holders
                    .iter()
                    .filter(|(_, v)| !direction.beats(value, *v) && !direction.beats(*v, value))
                    .count();
                (tied == 1).then(|| name.to_string())
            });

            if let Some(winner) = &unique_best {
                if let Some(count) = tally.wins.get_mut(winner) {
                    *count += 1;
                }
            }
            tally.bests.push(MetricBest {
                metric,
                direction,
                best: unique_best,
            });
        }
        tally
    }

    /// Branches sorted by win count descending, then name ascending
    #[must_use]
    pub fn ranking(&self) -> Vec<(String, usize)> {
        let mut ranked: Vec<(String, usize)> =
            self.wins.iter().map(|(n, c)| (n.clone(), *c)).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
    }

    /// Every branch tied at the top win count
    #[must_use]
    pub fn top(&self) -> Vec<String> {
        let Some(max) = self.wins.values().max().copied() else {
            return Vec::new();
        };
        self.ranking()
            .into_iter()
            .filter(|(_, count)| *count == max)
            .map(|(name, _)| name)
            .collect()
    }

    /// Win count for one branch
    #[inline]
    #[must_use]
    pub fn wins_for(&self, branch: &str) -> usize {
        self.wins.get(branch).copied().unwrap_or(0)
    }
}
