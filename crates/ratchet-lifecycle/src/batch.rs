//! Batches of branches competing against one baseline

use crate::branch::Baseline;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique batch identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BatchId(pub Ulid);

impl BatchId {
    /// Generate new batch ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for BatchId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BatchId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Branches launched against a shared baseline
///
/// Members compete against the batch's baseline, never against baselines
/// established mid-flight. Reconciliation waits for every member to settle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Batch identifier
    pub id: BatchId,
    /// Baseline all members are compared against
    pub baseline: Baseline,
    /// Member branch names, insertion order
    pub members: Vec<String>,
}

impl Batch {
    /// Open a batch against a baseline
    #[must_use]
    pub fn new(baseline: Baseline) -> Self {
        Self {
            id: BatchId::new(),
            baseline,
            members: Vec::new(),
        }
    }

    /// Add a member branch; re-adding is a no-op
    pub fn add_member(&mut self, branch: impl Into<String>) {
        let branch = branch.into();
        if !self.members.iter().any(|m| m == &branch) {
            self.members.push(branch);
        }
    }

    /// Whether the branch belongs to this batch
    #[inline]
    #[must_use]
    pub fn contains(&self, branch: &str) -> bool {
        self.members.iter().any(|m| m == branch)
    }

    /// Number of member branches
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the batch has no members
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Readiness of a batch's reconciliation gate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateStatus {
    /// Whether every member has settled
    pub ready: bool,
    /// Members still holding the gate
    pub pending: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratchet_registry::MetricMap;

    fn baseline() -> Baseline {
        Baseline::new("base-1", "main", "aaaa1111", MetricMap::new())
    }

    #[test]
    fn members_are_unique() {
        let mut batch = Batch::new(baseline());
        batch.add_member("tune-lr");
        batch.add_member("wider-ffn");
        batch.add_member("tune-lr");
        assert_eq!(batch.len(), 2);
        assert!(batch.contains("tune-lr"));
        assert!(!batch.contains("drop-warmup"));
    }
}
