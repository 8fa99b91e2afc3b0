//! Single-writer access to the trunk
//!
//! Trunk mutations (merges, reverts, release tags) are routed through a
//! [`TrunkWriter`], and at most one writer exists per [`Trunk`] at a
//! time. Read operations stay on [`CodeHost`] and need no claim.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::error::ForgeError;
use crate::host::CodeHost;
use crate::types::{CommitId, MergeReceipt, ReviewId};

/// Returned when a second writer is requested while one is live
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("trunk writer already claimed")]
pub struct WriterBusy;

/// Gate handing out exclusive write access to a host's trunk
#[derive(Clone)]
pub struct Trunk {
    host: Arc<dyn CodeHost>,
    claimed: Arc<AtomicBool>,
}

impl Trunk {
    /// Wrap a host in a single-writer gate
    #[must_use]
    pub fn new(host: Arc<dyn CodeHost>) -> Self {
        Self {
            host,
            claimed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Claim the writer, failing if one is already out.
    ///
    /// The claim is released when the returned [`TrunkWriter`] drops.
    pub fn try_writer(&self) -> Result<TrunkWriter, WriterBusy> {
        if self
            .claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WriterBusy);
        }
        debug!("trunk writer claimed");
        Ok(TrunkWriter {
            host: Arc::clone(&self.host),
            claimed: Arc::clone(&self.claimed),
        })
    }

    /// Current trunk head; needs no claim
    pub async fn head(&self) -> Result<CommitId, ForgeError> {
        self.host.trunk_head().await
    }
}

/// Exclusive capability to mutate the trunk.
///
/// Mutating methods take `&mut self` so a writer cannot be shared, and
/// only one writer exists at a time, so merge sequences and reverts are
/// never interleaved with another actor's trunk writes.
pub struct TrunkWriter {
    host: Arc<dyn CodeHost>,
    claimed: Arc<AtomicBool>,
}

impl std::fmt::Debug for TrunkWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrunkWriter").finish_non_exhaustive()
    }
}

impl TrunkWriter {
    /// Merge an open review into the trunk
    pub async fn merge(&mut self, id: ReviewId) -> Result<MergeReceipt, ForgeError> {
        self.host.merge(id).await
    }

    /// Append a revert of `commit` to the trunk
    pub async fn revert(
        &mut self,
        commit: &CommitId,
        reason: &str,
    ) -> Result<CommitId, ForgeError> {
        self.host.revert_commit(commit, reason).await
    }

    /// Tag the current trunk head
    pub async fn tag_release(&mut self, tag: &str) -> Result<CommitId, ForgeError> {
        self.host.tag_release(tag).await
    }

    /// Current trunk head
    pub async fn head(&self) -> Result<CommitId, ForgeError> {
        self.host.trunk_head().await
    }
}

impl Drop for TrunkWriter {
    fn drop(&mut self) {
        self.claimed.store(false, Ordering::Release);
        debug!("trunk writer released");
    }
}
