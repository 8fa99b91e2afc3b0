//! Commits, reviews, and issues as the code host reports them

use serde::{Deserialize, Serialize};

/// Commit identifier on the code host
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl CommitId {
    /// Borrow the raw identifier
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for display
    #[must_use]
    pub fn short(&self) -> String {
        self.0.chars().take(8).collect()
    }
}

impl From<&str> for CommitId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CommitId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Review request number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReviewId(pub u64);

impl std::fmt::Display for ReviewId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Review request lifecycle on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    /// Open for review
    Open,
    /// Merged to trunk
    Merged,
    /// Closed without merging
    Closed,
}

/// A review request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    /// Review number
    pub id: ReviewId,
    /// Source branch
    pub branch: String,
    /// Title
    pub title: String,
    /// Body text
    pub body: String,
    /// Host-side state
    pub state: ReviewState,
    /// Labels currently applied
    pub labels: Vec<String>,
    /// Comments, oldest first
    pub comments: Vec<String>,
    /// When the review was opened
    pub opened_at: chrono::DateTime<chrono::Utc>,
}

/// Receipt for a completed merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeReceipt {
    /// Review that was merged
    pub review: ReviewId,
    /// Branch that landed
    pub branch: String,
    /// Merge commit now at the trunk head
    pub merge_commit: CommitId,
}

/// An issue on the code host
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    /// Issue number
    pub number: u64,
    /// Title
    pub title: String,
    /// Body text
    pub body: String,
    /// Labels applied
    pub labels: Vec<String>,
    /// Whether the issue is open
    pub open: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_short_form() {
        let commit = CommitId::from("deadbeefcafef00d");
        assert_eq!(commit.short(), "deadbeef");
        let tiny = CommitId::from("ab12");
        assert_eq!(tiny.short(), "ab12");
    }

    #[test]
    fn review_id_displays_with_hash() {
        assert_eq!(ReviewId(42).to_string(), "#42");
    }
}
