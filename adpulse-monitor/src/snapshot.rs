//! Last known metric record for the selected campaign, fetched on demand.

use crate::{
    api::CampaignsClient,
    cache::{QueryCache, RetryPolicy},
    transport::SubscriptionKey,
};
use async_trait::async_trait;
use metrics::counter;
use shared::{
    config::Config,
    models::{ApiError, CampaignInsight},
};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tracing::{debug, warn};

/// Something that can produce the current metric record for a campaign.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetches the record for `key` once.
    async fn fetch_snapshot(&self, key: &SubscriptionKey) -> Result<CampaignInsight, ApiError>;
}

#[async_trait]
impl SnapshotSource for CampaignsClient {
    async fn fetch_snapshot(&self, key: &SubscriptionKey) -> Result<CampaignInsight, ApiError> {
        self.get_campaign_insights(key.as_str()).await
    }
}

/// Load state of a snapshot request.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SnapshotState {
    /// Nothing has been requested.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The most recent request succeeded.
    Loaded(CampaignInsight),
    /// The most recent request failed.
    Failed(ApiError),
}

impl SnapshotState {
    /// The loaded record, if any.
    #[must_use]
    pub fn loaded(&self) -> Option<&CampaignInsight> {
        match self {
            Self::Loaded(metric) => Some(metric),
            _ => None,
        }
    }

    /// Wraps a fetch result.
    #[must_use]
    pub fn from_result(result: Result<CampaignInsight, ApiError>) -> Self {
        match result {
            Ok(metric) => Self::Loaded(metric),
            Err(err) => Self::Failed(err),
        }
    }
}

/// Cached, retrying snapshot loader.
///
/// Cloning is cheap and clones share one cache, so a fetch can be spawned onto its own
/// task while the owner keeps serving.
#[derive(Debug)]
pub struct SnapshotFetcher<S> {
    source: Arc<S>,
    cache: Arc<Mutex<QueryCache<SubscriptionKey, CampaignInsight>>>,
    policy: RetryPolicy,
}

impl<S> Clone for SnapshotFetcher<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
            cache: Arc::clone(&self.cache),
            policy: self.policy,
        }
    }
}

impl<S: SnapshotSource> SnapshotFetcher<S> {
    /// Creates a fetcher whose results stay fresh for `stale_after`.
    pub fn new(source: Arc<S>, stale_after: Duration, policy: RetryPolicy) -> Self {
        Self {
            source,
            cache: Arc::new(Mutex::new(QueryCache::new(stale_after))),
            policy,
        }
    }

    /// Creates a fetcher using the configured freshness window and retry policy.
    pub fn from_config(source: Arc<S>, config: &Config) -> Self {
        Self::new(
            source,
            config.insights_stale_after(),
            RetryPolicy::from_config(config),
        )
    }

    fn cache(&self) -> MutexGuard<'_, QueryCache<SubscriptionKey, CampaignInsight>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the record for `key`, served from cache while it is fresh.
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once retries are exhausted.
    pub async fn fetch(&self, key: &SubscriptionKey) -> Result<CampaignInsight, ApiError> {
        let cached = self.cache().get_fresh(key);
        if let Some(metric) = cached {
            debug!(key = %key, "snapshot served from cache");
            return Ok(metric);
        }
        self.refetch(key).await
    }

    /// Fetches the record for `key` from the source, bypassing the cache.
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once retries are exhausted.
    pub async fn refetch(&self, key: &SubscriptionKey) -> Result<CampaignInsight, ApiError> {
        counter!("adpulse_snapshot_fetches_total").increment(1);
        let result = self.policy.run(|| self.source.fetch_snapshot(key)).await;

        match &result {
            Ok(metric) => {
                self.cache().insert(key.clone(), metric.clone());
            }
            Err(err) => warn!(
                key = %key,
                status = err.status,
                message = %err.message,
                "snapshot fetch failed"
            ),
        }
        result
    }

    /// Drops the cached record for `key`.
    pub fn invalidate(&self, key: &SubscriptionKey) {
        self.cache().invalidate(key);
    }
}
