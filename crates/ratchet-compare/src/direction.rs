//! Optimization direction per metric

use serde::{Deserialize, Serialize};

/// Name fragments that mark a metric as minimized
pub const LOWER_BETTER_TOKENS: [&str; 6] = ["loss", "error", "perplexity", "mse", "mae", "rmse"];

/// Which way a metric improves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Smaller values win (losses, error rates)
    LowerIsBetter,
    /// Larger values win (accuracies, rewards)
    HigherIsBetter,
}

impl Direction {
    /// Classify a metric by name
    ///
    /// A case-insensitive substring match against [`LOWER_BETTER_TOKENS`];
    /// anything else is assumed higher-is-better. Explicit overrides in a
    /// [`ComparisonSpec`](crate::ComparisonSpec) take precedence over this
    /// heuristic.
    #[must_use]
    pub fn for_metric(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if LOWER_BETTER_TOKENS.iter().any(|t| lowered.contains(t)) {
            Self::LowerIsBetter
        } else {
            Self::HigherIsBetter
        }
    }

    /// Whether a delta (candidate minus baseline) is an improvement
    #[inline]
    #[must_use]
    pub fn improved(self, delta: f64) -> bool {
        match self {
            Self::LowerIsBetter => delta < 0.0,
            Self::HigherIsBetter => delta > 0.0,
        }
    }

    /// Whether `a` strictly beats `b`
    #[inline]
    #[must_use]
    pub fn beats(self, a: f64, b: f64) -> bool {
        match self {
            Self::LowerIsBetter => a < b,
            Self::HigherIsBetter => a > b,
        }
    }

    /// Human label for tables
    #[inline]
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::LowerIsBetter => "lower is better",
            Self::HigherIsBetter => "higher is better",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
