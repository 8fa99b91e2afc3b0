//! Bounded-backoff retry decorator for registry calls
//!
//! Wraps any [`RunRegistry`] so transient service failures are retried with
//! exponential backoff and full jitter. Everything else passes through
//! untouched: not-found is an answer, auth failures are fatal.

use crate::error::RegistryError;
use crate::registry::{RunFilter, RunRegistry};
use crate::run::{ArtifactRecord, HistoryStep, Run, RunId};
use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Backoff policy for transient failures
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct Backoff {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Ceiling on any single delay
    pub max_delay: Duration,
    /// Multiply each delay by a random factor in 0.5..=1.0
    pub jitter: bool,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl Backoff {
    /// Delay to sleep after the given attempt (1-based) fails
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let raw = self.base_delay.saturating_mul(1 << exp);
        let capped = raw.min(self.max_delay);
        if self.jitter {
            let mut rng = rand::rng();
            capped.mul_f64(rng.random_range(0.5..=1.0))
        } else {
            capped
        }
    }
}

/// Retry a fallible call per the backoff policy
///
/// Only [`RegistryError::Transient`] is retried; when the budget runs out
/// the last transient failure is wrapped in `RetriesExhausted`.
async fn with_retry<T, F, Fut>(
    backoff: &Backoff,
    op: &'static str,
    mut call: F,
) -> Result<T, RegistryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RegistryError>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < backoff.max_attempts => {
                let delay = backoff.delay_for(attempt);
                warn!(op, attempt, ?delay, %err, "transient registry failure, backing off");
                tokio::time::sleep(delay).await;
            }
            Err(err) if err.is_retryable() => {
                return Err(RegistryError::RetriesExhausted {
                    attempts: attempt,
                    last: Box::new(err),
                });
            }
            Err(err) => return Err(err),
        }
    }
}

/// Registry decorator applying [`Backoff`] to every call
#[derive(Debug)]
pub struct RetryingRegistry<R> {
    inner: R,
    backoff: Backoff,
}

impl<R: RunRegistry> RetryingRegistry<R> {
    /// Wrap a registry with the default backoff
    #[inline]
    #[must_use]
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            backoff: Backoff::default(),
        }
    }

    /// Wrap a registry with an explicit backoff
    #[inline]
    #[must_use]
    pub fn with_backoff(inner: R, backoff: Backoff) -> Self {
        Self { inner, backoff }
    }
}

#[async_trait]
impl<R: RunRegistry> RunRegistry for RetryingRegistry<R> {
    async fn get_run(&self, id: &RunId) -> Result<Run, RegistryError> {
        with_retry(&self.backoff, "get_run", || self.inner.get_run(id)).await
    }

    async fn latest_run_for_branch(&self, branch: &str) -> Result<Option<Run>, RegistryError> {
        with_retry(&self.backoff, "latest_run_for_branch", || {
            self.inner.latest_run_for_branch(branch)
        })
        .await
    }

    async fn list_runs(&self, filter: &RunFilter) -> Result<Vec<Run>, RegistryError> {
        with_retry(&self.backoff, "list_runs", || self.inner.list_runs(filter)).await
    }

    async fn get_history(&self, id: &RunId) -> Result<Vec<HistoryStep>, RegistryError> {
        with_retry(&self.backoff, "get_history", || self.inner.get_history(id)).await
    }

    async fn set_tag(&self, id: &RunId, tag: &str) -> Result<(), RegistryError> {
        with_retry(&self.backoff, "set_tag", || self.inner.set_tag(id, tag)).await
    }

    async fn remove_tag(&self, id: &RunId, tag: &str) -> Result<(), RegistryError> {
        with_retry(&self.backoff, "remove_tag", || self.inner.remove_tag(id, tag)).await
    }

    async fn add_note(&self, id: &RunId, note: &str, append: bool) -> Result<(), RegistryError> {
        with_retry(&self.backoff, "add_note", || {
            self.inner.add_note(id, note, append)
        })
        .await
    }

    async fn cancel(&self, id: &RunId) -> Result<bool, RegistryError> {
        with_retry(&self.backoff, "cancel", || self.inner.cancel(id)).await
    }

    async fn delete(&self, id: &RunId, delete_artifacts: bool) -> Result<(), RegistryError> {
        with_retry(&self.backoff, "delete", || {
            self.inner.delete(id, delete_artifacts)
        })
        .await
    }

    async fn log_tail(&self, id: &RunId, max_lines: usize) -> Result<Vec<String>, RegistryError> {
        with_retry(&self.backoff, "log_tail", || {
            self.inner.log_tail(id, max_lines)
        })
        .await
    }

    async fn list_artifacts(&self, id: &RunId) -> Result<Vec<ArtifactRecord>, RegistryError> {
        with_retry(&self.backoff, "list_artifacts", || {
            self.inner.list_artifacts(id)
        })
        .await
    }
}
