//! Post-merge trunk validation

use async_trait::async_trait;
use ratchet_forge::CommitId;

/// Result of smoke-testing a trunk head
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmokeOutcome {
    /// The trunk is healthy; the merge sequence may continue
    Passed,
    /// The trunk is broken at this head
    Failed {
        /// What the check observed
        detail: String,
    },
}

impl SmokeOutcome {
    /// Whether the check passed
    #[inline]
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Validates the trunk after each merge, before the next one starts.
///
/// A failure halts the merge sequence where it stands: already-merged
/// branches stay merged, the rest stay unmerged.
#[async_trait]
pub trait SmokeCheck: Send + Sync {
    /// Check the trunk at the given head
    async fn check(&self, head: &CommitId) -> SmokeOutcome;
}

/// Smoke check that always passes
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHealthy;

#[async_trait]
impl SmokeCheck for AlwaysHealthy {
    async fn check(&self, _head: &CommitId) -> SmokeOutcome {
        SmokeOutcome::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_healthy_passes() {
        let outcome = AlwaysHealthy.check(&CommitId("m000001".into())).await;
        assert!(outcome.passed());
    }
}
