//! Quality gate run over promoted winners before they may merge

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// How serious a review finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic; never holds a merge
    Nit,
    /// Worth a look; never holds a merge
    Warning,
    /// Holds the merge until an operator decides
    Blocker,
}

impl Severity {
    /// Lowercase label for rendering
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Nit => "nit",
            Self::Warning => "warning",
            Self::Blocker => "blocker",
        }
    }
}

/// One finding from a review pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    /// Finding severity
    pub severity: Severity,
    /// What the reviewer found
    pub message: String,
    /// File or file:line, when the finding is anchored to code
    pub location: Option<String>,
}

impl Finding {
    /// Create a finding with no location
    #[must_use]
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            location: None,
        }
    }

    /// With a code location
    #[inline]
    #[must_use]
    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    /// Whether this finding holds a merge
    #[inline]
    #[must_use]
    pub fn blocks(&self) -> bool {
        self.severity == Severity::Blocker
    }
}

/// Operator resolution for a winner held at the gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperatorDecision {
    /// Merge despite the blockers
    MergeAnyway,
    /// Send the branch back to implementation
    ReturnForFix,
    /// Drop the branch entirely
    Close,
}

/// The review pass could not produce findings at all
#[derive(Debug, thiserror::Error)]
#[error("review pass failed on {branch}: {detail}")]
pub struct ReviewPassError {
    /// Branch under review
    pub branch: String,
    /// What went wrong
    pub detail: String,
}

/// Reviews a winner's branch before it is allowed onto the trunk.
///
/// The reviewer only reports; holding or clearing the merge is the
/// reconciler's call based on the findings' severities.
#[async_trait]
pub trait ReviewPass: Send + Sync {
    /// Review the branch, returning every finding
    async fn review(&self, branch: &str) -> Result<Vec<Finding>, ReviewPassError>;
}

/// Review pass that clears everything
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

#[async_trait]
impl ReviewPass for ApproveAll {
    async fn review(&self, _branch: &str) -> Result<Vec<Finding>, ReviewPassError> {
        Ok(Vec::new())
    }
}
