//! In-memory code host with a linear trunk
//!
//! Backs tests and local dry runs. Conflicts are modelled through
//! touched paths: a merge fails when the branch touches a path some
//! earlier merge already landed on the trunk.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::error::ForgeError;
use crate::host::CodeHost;
use crate::types::{CommitId, Issue, MergeReceipt, Review, ReviewId, ReviewState};

/// In-memory [`CodeHost`] with conflict injection for tests
pub struct MemoryForge {
    trunk: Mutex<Vec<CommitId>>,
    reviews: DashMap<u64, Review>,
    issues: DashMap<u64, Issue>,
    tags: DashMap<String, CommitId>,
    touched: DashMap<String, Vec<String>>,
    merged_paths: Mutex<BTreeSet<String>>,
    next_review: AtomicU64,
    next_commit: AtomicU64,
    next_issue: AtomicU64,
}

impl MemoryForge {
    /// Create a forge whose trunk holds a single genesis commit
    #[must_use]
    pub fn new() -> Self {
        let forge = Self {
            trunk: Mutex::new(Vec::new()),
            reviews: DashMap::new(),
            issues: DashMap::new(),
            tags: DashMap::new(),
            touched: DashMap::new(),
            merged_paths: Mutex::new(BTreeSet::new()),
            next_review: AtomicU64::new(1),
            next_commit: AtomicU64::new(0),
            next_issue: AtomicU64::new(1),
        };
        let genesis = forge.mint_commit();
        forge.trunk.lock().push(genesis);
        forge
    }

    fn mint_commit(&self) -> CommitId {
        let n = self.next_commit.fetch_add(1, Ordering::SeqCst);
        CommitId(format!("m{n:06}"))
    }

    /// Declare which paths `branch` touches.
    ///
    /// A later [`CodeHost::merge`] of the branch conflicts iff one of
    /// these paths was already landed by an earlier merge. Branches
    /// with no declared paths always merge cleanly.
    pub fn set_touched_paths(&self, branch: impl Into<String>, paths: &[&str]) {
        self.touched
            .insert(branch.into(), paths.iter().map(|p| (*p).to_string()).collect());
    }

    /// Full trunk history, oldest first
    #[must_use]
    pub fn trunk_history(&self) -> Vec<CommitId> {
        self.trunk.lock().clone()
    }

    fn conflicting_paths(&self, branch: &str) -> Vec<String> {
        let Some(paths) = self.touched.get(branch) else {
            return Vec::new();
        };
        let landed = self.merged_paths.lock();
        paths
            .iter()
            .filter(|p| landed.contains(*p))
            .cloned()
            .collect()
    }
}

impl Default for MemoryForge {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CodeHost for MemoryForge {
    async fn open_review(
        &self,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<Review, ForgeError> {
        if self.find_review_for_branch(branch).await?.is_some() {
            return Err(ForgeError::AlreadyExists(branch.to_string()));
        }
        let id = ReviewId(self.next_review.fetch_add(1, Ordering::SeqCst));
        let review = Review {
            id,
            branch: branch.to_string(),
            title: title.to_string(),
            body: body.to_string(),
            state: ReviewState::Open,
            labels: Vec::new(),
            comments: Vec::new(),
            opened_at: Utc::now(),
        };
        self.reviews.insert(id.0, review.clone());
        info!(%id, branch, "review opened");
        Ok(review)
    }

    async fn find_review_for_branch(&self, branch: &str) -> Result<Option<Review>, ForgeError> {
        let mut open: Vec<Review> = self
            .reviews
            .iter()
            .filter(|e| e.value().branch == branch && e.value().state == ReviewState::Open)
            .map(|e| e.value().clone())
            .collect();
        open.sort_by_key(|r| r.id.0);
        Ok(open.pop())
    }

    async fn get_review(&self, id: ReviewId) -> Result<Review, ForgeError> {
        self.reviews
            .get(&id.0)
            .map(|e| e.value().clone())
            .ok_or_else(|| ForgeError::NotFound(format!("review {id}")))
    }

    async fn comment(&self, id: ReviewId, body: &str) -> Result<(), ForgeError> {
        let mut review = self
            .reviews
            .get_mut(&id.0)
            .ok_or_else(|| ForgeError::NotFound(format!("review {id}")))?;
        review.comments.push(body.to_string());
        Ok(())
    }

    async fn add_label(&self, id: ReviewId, label: &str) -> Result<(), ForgeError> {
        let mut review = self
            .reviews
            .get_mut(&id.0)
            .ok_or_else(|| ForgeError::NotFound(format!("review {id}")))?;
        if !review.labels.iter().any(|l| l == label) {
            review.labels.push(label.to_string());
        }
        Ok(())
    }

    async fn remove_label(&self, id: ReviewId, label: &str) -> Result<(), ForgeError> {
        let mut review = self
            .reviews
            .get_mut(&id.0)
            .ok_or_else(|| ForgeError::NotFound(format!("review {id}")))?;
        review.labels.retain(|l| l != label);
        Ok(())
    }

    async fn close_review(&self, id: ReviewId, reason: &str) -> Result<(), ForgeError> {
        let mut review = self
            .reviews
            .get_mut(&id.0)
            .ok_or_else(|| ForgeError::NotFound(format!("review {id}")))?;
        if review.state != ReviewState::Open {
            return Err(ForgeError::ReviewNotOpen(id));
        }
        review.state = ReviewState::Closed;
        review.comments.push(format!("closed: {reason}"));
        info!(%id, reason, "review closed");
        Ok(())
    }

    async fn merge(&self, id: ReviewId) -> Result<MergeReceipt, ForgeError> {
        let branch = {
            let review = self
                .reviews
                .get(&id.0)
                .ok_or_else(|| ForgeError::NotFound(format!("review {id}")))?;
            if review.state != ReviewState::Open {
                return Err(ForgeError::ReviewNotOpen(id));
            }
            review.branch.clone()
        };

        let files = self.conflicting_paths(&branch);
        if !files.is_empty() {
            warn!(%id, branch, ?files, "merge conflict");
            return Err(ForgeError::MergeConflict { branch, files });
        }

        let merge_commit = self.mint_commit();
        self.trunk.lock().push(merge_commit.clone());
        if let Some(paths) = self.touched.get(&branch) {
            self.merged_paths.lock().extend(paths.iter().cloned());
        }
        if let Some(mut review) = self.reviews.get_mut(&id.0) {
            review.state = ReviewState::Merged;
        }
        info!(%id, branch, commit = %merge_commit, "merged to trunk");
        Ok(MergeReceipt {
            review: id,
            branch,
            merge_commit,
        })
    }

    async fn revert_commit(
        &self,
        commit: &CommitId,
        reason: &str,
    ) -> Result<CommitId, ForgeError> {
        {
            let trunk = self.trunk.lock();
            if !trunk.contains(commit) {
                return Err(ForgeError::NotFound(format!("commit {commit}")));
            }
        }
        let revert = self.mint_commit();
        self.trunk.lock().push(revert.clone());
        info!(reverted = %commit, commit = %revert, reason, "trunk reverted");
        Ok(revert)
    }

    async fn tag_release(&self, tag: &str) -> Result<CommitId, ForgeError> {
        let head = self.trunk_head().await?;
        self.tags.insert(tag.to_string(), head.clone());
        Ok(head)
    }

    async fn create_issue(
        &self,
        title: &str,
        body: &str,
        labels: &[String],
    ) -> Result<Issue, ForgeError> {
        let number = self.next_issue.fetch_add(1, Ordering::SeqCst);
        let issue = Issue {
            number,
            title: title.to_string(),
            body: body.to_string(),
            labels: labels.to_vec(),
            open: true,
        };
        self.issues.insert(number, issue.clone());
        Ok(issue)
    }

    async fn list_issues(&self, label: Option<&str>) -> Result<Vec<Issue>, ForgeError> {
        let mut out: Vec<Issue> = self
            .issues
            .iter()
            .filter(|e| label.map_or(true, |l| e.value().labels.iter().any(|have| have == l)))
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|i| i.number);
        Ok(out)
    }

    async fn trunk_head(&self) -> Result<CommitId, ForgeError> {
        self.trunk
            .lock()
            .last()
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("trunk is empty".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_advances_trunk_and_closes_review() {
        let forge = MemoryForge::new();
        let head_before = forge.trunk_head().await.unwrap();
        let review = forge.open_review("tune-lr", "Tune LR", "sweep").await.unwrap();

        let receipt = forge.merge(review.id).await.unwrap();
        assert_eq!(receipt.branch, "tune-lr");
        assert_ne!(receipt.merge_commit, head_before);
        assert_eq!(forge.trunk_head().await.unwrap(), receipt.merge_commit);

        let merged = forge.get_review(review.id).await.unwrap();
        assert_eq!(merged.state, ReviewState::Merged);
        // merged reviews cannot be merged twice
        assert!(matches!(
            forge.merge(review.id).await,
            Err(ForgeError::ReviewNotOpen(_))
        ));
    }

    #[tokio::test]
    async fn overlapping_paths_conflict_in_merge_order() {
        let forge = MemoryForge::new();
        forge.set_touched_paths("first", &["model.py", "train.py"]);
        forge.set_touched_paths("second", &["train.py"]);

        let a = forge.open_review("first", "a", "").await.unwrap();
        let b = forge.open_review("second", "b", "").await.unwrap();

        forge.merge(a.id).await.unwrap();
        let err = forge.merge(b.id).await.unwrap_err();
        match err {
            ForgeError::MergeConflict { branch, files } => {
                assert_eq!(branch, "second");
                assert_eq!(files, vec!["train.py".to_string()]);
            }
            other => panic!("expected conflict, got {other}"),
        }
        // the failed merge leaves the review open and the trunk intact
        let still_open = forge.get_review(b.id).await.unwrap();
        assert_eq!(still_open.state, ReviewState::Open);
        assert_eq!(forge.trunk_history().len(), 2);
    }

    #[tokio::test]
    async fn disjoint_paths_merge_cleanly() {
        let forge = MemoryForge::new();
        forge.set_touched_paths("first", &["model.py"]);
        forge.set_touched_paths("second", &["data.py"]);

        let a = forge.open_review("first", "a", "").await.unwrap();
        let b = forge.open_review("second", "b", "").await.unwrap();
        forge.merge(a.id).await.unwrap();
        forge.merge(b.id).await.unwrap();
        assert_eq!(forge.trunk_history().len(), 3);
    }

    #[tokio::test]
    async fn one_open_review_per_branch() {
        let forge = MemoryForge::new();
        forge.open_review("tune-lr", "a", "").await.unwrap();
        assert!(matches!(
            forge.open_review("tune-lr", "b", "").await,
            Err(ForgeError::AlreadyExists(_))
        ));

        let found = forge.find_review_for_branch("tune-lr").await.unwrap();
        assert_eq!(found.unwrap().title, "a");
        assert!(forge.find_review_for_branch("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn revert_appends_instead_of_rewriting() {
        let forge = MemoryForge::new();
        let review = forge.open_review("tune-lr", "a", "").await.unwrap();
        let receipt = forge.merge(review.id).await.unwrap();
        let before = forge.trunk_history();

        let revert = forge
            .revert_commit(&receipt.merge_commit, "regressed eval loss")
            .await
            .unwrap();

        let after = forge.trunk_history();
        assert_eq!(after.len(), before.len() + 1);
        assert_eq!(after[..before.len()], before[..]);
        assert_eq!(after.last(), Some(&revert));
    }

    #[tokio::test]
    async fn revert_of_unknown_commit_is_not_found() {
        let forge = MemoryForge::new();
        let err = forge
            .revert_commit(&CommitId("nope".into()), "why")
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn labels_are_idempotent() {
        let forge = MemoryForge::new();
        let review = forge.open_review("tune-lr", "a", "").await.unwrap();
        forge.add_label(review.id, "winner").await.unwrap();
        forge.add_label(review.id, "winner").await.unwrap();
        let fetched = forge.get_review(review.id).await.unwrap();
        assert_eq!(fetched.labels, vec!["winner".to_string()]);

        forge.remove_label(review.id, "winner").await.unwrap();
        forge.remove_label(review.id, "winner").await.unwrap();
        assert!(forge.get_review(review.id).await.unwrap().labels.is_empty());
    }

    #[tokio::test]
    async fn issues_are_numbered_and_filterable() {
        let forge = MemoryForge::new();
        forge.create_issue("first", "", &[]).await.unwrap();
        forge
            .create_issue("second", "", &["regression".to_string()])
            .await
            .unwrap();

        let issues = forge.list_issues(None).await.unwrap();
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].number, 1);
        assert_eq!(issues[1].title, "second");

        let tagged = forge.list_issues(Some("regression")).await.unwrap();
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].title, "second");
    }
}
