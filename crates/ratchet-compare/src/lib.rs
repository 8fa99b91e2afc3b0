//! Ratchet Compare - metric comparison
//!
//! Deterministic comparison of run summaries against baselines and against
//! each other.
//!
//! # Core Concepts
//!
//! - [`Direction`]: which way a metric improves, by name heuristic
//! - [`ComparisonSpec`]: metric selection plus direction overrides
//! - [`compare`]: candidate-vs-baseline deltas with skip reasons
//! - [`WinTally`]: strict win counts across several branches
//! - [`config_diff`]: hyperparameter differences between branches
//!
//! Comparisons are derived data: the same summaries always produce the same
//! result, so nothing here is cached or stored.

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod config_diff;
mod delta;
mod direction;
mod spec;
mod tally;

pub use config_diff::{config_diff, ConfigDiffRow, BOOKKEEPING_KEYS};
pub use delta::{compare, ComparisonResult, MetricDelta, SkipReason, SkippedMetric};
pub use direction::{Direction, LOWER_BETTER_TOKENS};
pub use spec::ComparisonSpec;
pub use tally::{Contender, MetricBest, WinTally};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
