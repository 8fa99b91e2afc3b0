//! Error types for code-host operations

use crate::types::ReviewId;

/// Errors surfaced by [`CodeHost`](crate::CodeHost) implementations
#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    /// The branch does not apply cleanly onto the current trunk
    ///
    /// Never resolved automatically; the merge sequence halts and an
    /// explicit choice (rebase, drop, manual resolution) is required.
    #[error("merge conflict on {branch}: {files:?}")]
    MergeConflict {
        /// Branch that failed to merge
        branch: String,
        /// Conflicting paths
        files: Vec<String>,
    },

    /// The review, commit, or issue does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The review is not open, so it cannot be merged or commented on
    #[error("review {0} is not open")]
    ReviewNotOpen(ReviewId),

    /// A review for the branch already exists
    #[error("review already exists for branch {0}")]
    AlreadyExists(String),

    /// Credentials rejected; retrying cannot help
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Host hiccup (rate limit, timeout, 5xx); safe to retry
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ForgeError {
    /// Whether a retry with backoff could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Whether this is a merge conflict needing an explicit decision
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::MergeConflict { .. })
    }
}
