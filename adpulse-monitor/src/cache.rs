//! Freshness cache and retry policy for one-shot reads.

use shared::{config::Config, models::ApiError};
use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    time::{Duration, Instant},
};
use tracing::debug;

/// Upper bound for a single retry delay.
pub const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Keyed values that are served while younger than a fixed time-to-live.
#[derive(Debug, Clone)]
pub struct QueryCache<K, V> {
    ttl: Duration,
    entries: HashMap<K, (Instant, V)>,
}

impl<K: Eq + Hash, V: Clone> QueryCache<K, V> {
    /// Creates an empty cache whose entries go stale after `ttl`.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Returns the cached value if it is still fresh.
    pub fn get_fresh<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries
            .get(key)
            .filter(|(stored, _)| stored.elapsed() < self.ttl)
            .map(|(_, value)| value.clone())
    }

    /// Stores `value`, resetting its age. Entries that went stale are dropped.
    pub fn insert(&mut self, key: K, value: V) {
        let ttl = self.ttl;
        self.entries.retain(|_, (stored, _)| stored.elapsed() < ttl);
        self.entries.insert(key, (Instant::now(), value));
    }

    /// Forgets one entry.
    pub fn invalidate<Q>(&mut self, key: &Q)
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.remove(key);
    }

    /// Number of stored entries, fresh or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Bounded exponential retry for failed reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure.
    pub retries: u32,
    /// Delay before the first retry; doubles for each following one.
    pub base_delay: Duration,
    /// Ceiling for any single delay.
    pub max_delay: Duration,
    /// Retry only transient failures (see [`RetryPolicy::is_retryable`]).
    pub transient_only: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 1,
            base_delay: Duration::from_secs(1),
            max_delay: MAX_RETRY_DELAY,
            transient_only: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            transient_only: false,
        }
    }

    /// Policy described by the `cache` configuration section.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            retries: config.cache.retries,
            base_delay: config.retry_delay(),
            max_delay: MAX_RETRY_DELAY,
            transient_only: config.cache.retry_transient_only,
        }
    }

    /// Delay before retry number `attempt` (0-indexed).
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Whether a failure is transient: no response, a timeout, throttling or a
    /// server error.
    #[must_use]
    pub const fn is_retryable(err: &ApiError) -> bool {
        matches!(err.status, 0 | 408 | 429 | 500..)
    }

    /// Whether this policy retries `err` at all. Every failure qualifies unless
    /// `transient_only` is set.
    #[must_use]
    pub const fn should_retry(&self, err: &ApiError) -> bool {
        !self.transient_only || Self::is_retryable(err)
    }

    /// Runs `op` until it succeeds, fails terminally, or retries are exhausted.
    ///
    /// # Errors
    ///
    /// Returns the last error produced by `op`.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ApiError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.retries && self.should_retry(&err) => {
                    let delay = self.delay_for(attempt);
                    debug!(attempt, status = err.status, ?delay, "retrying request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
