//! The [`CodeHost`] trait: reviews, merges, reverts, and issues

use async_trait::async_trait;

use crate::error::ForgeError;
use crate::types::{CommitId, Issue, MergeReceipt, Review, ReviewId};

/// A code host holding the trunk, branches, and reviews.
///
/// Implementations are expected to be cheap to clone behind an `Arc`
/// and safe to share across tasks.
#[async_trait]
pub trait CodeHost: Send + Sync {
    /// Open a review proposing `branch` for merge into the trunk.
    ///
    /// Fails with [`ForgeError::AlreadyExists`] when an open review for
    /// the branch is already up.
    async fn open_review(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<Review, ForgeError>;

    /// Find the open review for `branch`, if any
    async fn find_review_for_branch(&self, branch: &str) -> Result<Option<Review>, ForgeError>;

    /// Fetch a review by id
    async fn get_review(&self, id: ReviewId) -> Result<Review, ForgeError>;

    /// Leave a comment on an open review
    async fn comment(&self, id: ReviewId, body: &str) -> Result<(), ForgeError>;

    /// Add a label to a review (idempotent)
    async fn add_label(&self, id: ReviewId, label: &str) -> Result<(), ForgeError>;

    /// Remove a label from a review; absent labels are ignored
    async fn remove_label(&self, id: ReviewId, label: &str) -> Result<(), ForgeError>;

    /// Close a review without merging
    async fn close_review(&self, id: ReviewId, reason: &str) -> Result<(), ForgeError>;

    /// Merge an open review into the trunk.
    ///
    /// On conflict returns [`ForgeError::MergeConflict`] and leaves the
    /// trunk untouched.
    async fn merge(&self, id: ReviewId) -> Result<MergeReceipt, ForgeError>;

    /// Add a commit that undoes `commit`, preserving history.
    ///
    /// The trunk moves forward; nothing is rewritten or force-pushed.
    async fn revert_commit(&self, commit: &CommitId, reason: &str)
        -> Result<CommitId, ForgeError>;

    /// Tag the current trunk head
    async fn tag_release(&self, tag: &str) -> Result<CommitId, ForgeError>;

    /// File an issue (used for regression reports)
    async fn create_issue(&self, title: &str, body: &str, labels: &[String])
        -> Result<Issue, ForgeError>;

    /// Issues carrying `label`, oldest first; every issue when `None`
    async fn list_issues(&self, label: Option<&str>) -> Result<Vec<Issue>, ForgeError>;

    /// Current trunk head commit
    async fn trunk_head(&self) -> Result<CommitId, ForgeError>;
}
