//! Hash-chained audit log of branch transitions
//!
//! Every transition is recorded with its reason and chained to the previous
//! event by SHA-256, so the history of how each branch reached its state can
//! be verified end to end.

use crate::state::BranchState;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use ulid::Ulid;

/// Unique audit event identifier (ULID for sortability)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(pub Ulid);

impl EventId {
    /// Generate new event ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One recorded transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionEvent {
    /// Event identifier
    pub id: EventId,
    /// When the transition happened
    pub at: chrono::DateTime<chrono::Utc>,
    /// Branch that moved
    pub branch: String,
    /// State it left
    pub from: BranchState,
    /// State it entered
    pub to: BranchState,
    /// Why it moved
    pub reason: String,
    /// Hash of the previous event
    pub prev_hash: [u8; 32],
    /// Hash of this event
    pub hash: [u8; 32],
}

/// Audit log integrity failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// A link or event hash does not match its recomputation
    #[error("audit chain integrity violation")]
    IntegrityViolation,
}

/// Append-only, hash-chained transition log
#[derive(Debug, Default)]
pub struct TransitionLog {
    inner: Mutex<Vec<TransitionEvent>>,
}

impl TransitionLog {
    /// Create an empty log
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transition, chaining it to the last event
    pub fn append(
        &self,
        branch: &str,
        from: BranchState,
        to: BranchState,
        reason: &str,
    ) -> EventId {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map(|e| e.hash).unwrap_or([0u8; 32]);
        let mut event = TransitionEvent {
            id: EventId::new(),
            at: chrono::Utc::now(),
            branch: branch.to_string(),
            from,
            to,
            reason: reason.to_string(),
            prev_hash,
            hash: [0u8; 32],
        };
        event.hash = compute_hash(&event);
        let id = event.id;
        guard.push(event);
        id
    }

    /// All events, in order
    #[must_use]
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.inner.lock().clone()
    }

    /// Events for one branch, in order
    #[must_use]
    pub fn for_branch(&self, branch: &str) -> Vec<TransitionEvent> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.branch == branch)
            .cloned()
            .collect()
    }

    /// Number of recorded events
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the log is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Walk the chain and recompute every hash
    pub fn verify(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        let mut prev = [0u8; 32];
        for event in guard.iter() {
            if event.prev_hash != prev {
                return Err(AuditError::IntegrityViolation);
            }
            if event.hash != compute_hash(event) {
                return Err(AuditError::IntegrityViolation);
            }
            prev = event.hash;
        }
        Ok(())
    }
}

fn compute_hash(event: &TransitionEvent) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(event.id.0.to_bytes());
    hasher.update(event.at.timestamp_micros().to_le_bytes());
    hasher.update(event.branch.as_bytes());
    hasher.update([0]);
    hasher.update(event.from.label().as_bytes());
    hasher.update([0]);
    hasher.update(event.to.label().as_bytes());
    hasher.update([0]);
    hasher.update(event.reason.as_bytes());
    hasher.update([0]);
    hasher.update(event.prev_hash);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::BranchState::*;

    #[test]
    fn chain_links_and_verifies() {
        let log = TransitionLog::new();
        log.append("tune-lr", Proposed, Implementing, "idea accepted");
        log.append("tune-lr", Implementing, Launched, "run submitted");
        log.append("wider-ffn", Proposed, Implementing, "idea accepted");

        assert_eq!(log.len(), 3);
        log.verify().unwrap();

        let events = log.events();
        assert_eq!(events[0].prev_hash, [0u8; 32]);
        assert_eq!(events[1].prev_hash, events[0].hash);
        assert_eq!(events[2].prev_hash, events[1].hash);
    }

    #[test]
    fn tampering_is_detected() {
        let log = TransitionLog::new();
        log.append("tune-lr", Proposed, Implementing, "idea accepted");
        log.append("tune-lr", Implementing, Launched, "run submitted");

        {
            let mut guard = log.inner.lock();
            guard[0].reason = "rewritten".to_string();
        }
        assert_eq!(log.verify(), Err(AuditError::IntegrityViolation));
    }

    #[test]
    fn per_branch_filter() {
        let log = TransitionLog::new();
        log.append("a", Proposed, Implementing, "accepted");
        log.append("b", Proposed, Implementing, "accepted");
        log.append("a", Implementing, Launched, "submitted");

        let for_a = log.for_branch("a");
        assert_eq!(for_a.len(), 2);
        assert!(for_a.iter().all(|e| e.branch == "a"));
    }
}
