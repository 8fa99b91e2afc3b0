//! Error types for the tracking-service adapter
//!
//! Classifies failures the way callers need to react to them:
//! - Transient service failures are retried with bounded backoff
//! - Missing runs are reported, never retried
//! - Authentication failures are fatal and surface immediately

/// Errors surfaced by [`RunRegistry`](crate::RunRegistry) implementations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// Service hiccup (rate limit, timeout, 5xx); safe to retry
    #[error("transient service failure: {0}")]
    Transient(String),

    /// The requested run, project, or artifact does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Credentials rejected; retrying cannot help
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// The service returned a record this adapter cannot interpret
    #[error("malformed run record: {0}")]
    Malformed(String),

    /// Write attempted against a read-only registry
    #[error("registry is read-only: {0}")]
    ReadOnly(String),

    /// Retry budget exhausted on a transient failure
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Attempts made, including the first
        attempts: u32,
        /// The final transient failure
        last: Box<RegistryError>,
    },
}

impl RegistryError {
    /// Whether a retry with backoff could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Whether the caller should stop the whole operation
    #[inline]
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

/// Errors surfaced by [`LaunchQueue`](crate::LaunchQueue) implementations
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The queue refused the request (bad entry point, missing image)
    #[error("launch rejected: {0}")]
    Rejected(String),

    /// Queue service hiccup; safe to retry
    #[error("transient queue failure: {0}")]
    Transient(String),

    /// Credentials rejected
    #[error("authentication rejected: {0}")]
    Auth(String),
}

impl QueueError {
    /// Whether a retry with backoff could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}
