//! Dashboard overview: campaign list, account totals and the figures derived from them.

use crate::{
    api::CampaignsClient,
    cache::{QueryCache, RetryPolicy},
};
use async_trait::async_trait;
use serde::Serialize;
use shared::{
    config::Config,
    models::{AggregateInsights, ApiError, Campaign, CampaignListResponse},
};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

/// Campaigns shown in the budget chart.
pub const TOP_CAMPAIGNS: usize = 6;

/// Label of the budget chart series.
pub const BUDGET_SERIES_NAME: &str = "Daily Spend";

const CAMPAIGNS_QUERY: &str = "campaigns";
const AGGREGATE_QUERY: &str = "insights/aggregate";

/// Reads backing the overview.
#[async_trait]
pub trait DashboardSource: Send + Sync {
    /// All campaigns.
    async fn fetch_campaigns(&self) -> Result<CampaignListResponse, ApiError>;
    /// Account-wide totals.
    async fn fetch_aggregate(&self) -> Result<AggregateInsights, ApiError>;
}

#[async_trait]
impl DashboardSource for CampaignsClient {
    async fn fetch_campaigns(&self) -> Result<CampaignListResponse, ApiError> {
        self.get_campaigns().await
    }

    async fn fetch_aggregate(&self) -> Result<AggregateInsights, ApiError> {
        self.get_aggregate_insights().await
    }
}

/// Campaigns whose name, brand or platforms contain `query`, ignoring case.
///
/// An empty query keeps every campaign. Order is preserved.
#[must_use]
pub fn filter_campaigns<'a>(campaigns: &'a [Campaign], query: &str) -> Vec<&'a Campaign> {
    let needle = query.to_lowercase();
    campaigns
        .iter()
        .filter(|campaign| {
            needle.is_empty() || campaign.search_text().to_lowercase().contains(&needle)
        })
        .collect()
}

/// Campaign counts per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusBreakdown {
    /// Running campaigns.
    pub active: u64,
    /// Paused campaigns.
    pub paused: u64,
    /// Finished campaigns.
    pub completed: u64,
}

impl StatusBreakdown {
    /// Counts from the aggregate; unknown counts are zero.
    #[must_use]
    pub fn from_aggregate(aggregate: &AggregateInsights) -> Self {
        Self {
            active: aggregate.active_campaigns.unwrap_or(0),
            paused: aggregate.paused_campaigns.unwrap_or(0),
            completed: aggregate.completed_campaigns.unwrap_or(0),
        }
    }

    /// `(label, count)` pairs in display order.
    #[must_use]
    pub fn entries(&self) -> [(&'static str, u64); 3] {
        [
            ("Active", self.active),
            ("Paused", self.paused),
            ("Completed", self.completed),
        ]
    }
}

/// Chart series of daily budgets for the first campaigns.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetSeries {
    /// Series label.
    pub name: &'static str,
    /// Campaign names, one per point.
    pub categories: Vec<String>,
    /// Daily budget per campaign; a missing budget plots as zero.
    pub data: Vec<f64>,
}

impl BudgetSeries {
    /// Series for the first [`TOP_CAMPAIGNS`] of `campaigns`.
    #[must_use]
    pub fn top(campaigns: &[&Campaign]) -> Self {
        let top = campaigns.iter().take(TOP_CAMPAIGNS);
        Self {
            name: BUDGET_SERIES_NAME,
            categories: top.clone().map(|campaign| campaign.name.clone()).collect(),
            data: top.map(|campaign| campaign.daily_budget.unwrap_or(0.0)).collect(),
        }
    }
}

/// Everything the overview screen shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardOverview {
    /// Campaigns matching the search query.
    pub campaigns: Vec<Campaign>,
    /// Total reported by the backend.
    pub total: Option<u64>,
    /// Account totals.
    pub aggregate: AggregateInsights,
    /// Budget chart.
    pub budget_series: BudgetSeries,
    /// Status donut.
    pub status_breakdown: StatusBreakdown,
}

impl DashboardOverview {
    /// Derives the overview from raw reads and a search query.
    #[must_use]
    pub fn build(list: &CampaignListResponse, aggregate: &AggregateInsights, query: &str) -> Self {
        let filtered = filter_campaigns(&list.campaigns, query);
        Self {
            budget_series: BudgetSeries::top(&filtered),
            campaigns: filtered.into_iter().cloned().collect(),
            total: list.total,
            aggregate: aggregate.clone(),
            status_breakdown: StatusBreakdown::from_aggregate(aggregate),
        }
    }
}

/// Cached campaign list and aggregate reads.
#[derive(Debug)]
pub struct DashboardQueries<D> {
    source: Arc<D>,
    campaigns: QueryCache<&'static str, CampaignListResponse>,
    aggregate: QueryCache<&'static str, AggregateInsights>,
    policy: RetryPolicy,
}

impl<D: DashboardSource> DashboardQueries<D> {
    /// Creates the queries with a shared freshness window.
    pub fn new(source: Arc<D>, stale_after: Duration, policy: RetryPolicy) -> Self {
        Self {
            source,
            campaigns: QueryCache::new(stale_after),
            aggregate: QueryCache::new(stale_after),
            policy,
        }
    }

    /// Creates the queries from configuration.
    pub fn from_config(source: Arc<D>, config: &Config) -> Self {
        Self::new(
            source,
            config.list_stale_after(),
            RetryPolicy::from_config(config),
        )
    }

    /// Campaign list, cached.
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once retries are exhausted.
    pub async fn campaigns(&mut self) -> Result<CampaignListResponse, ApiError> {
        if let Some(list) = self.campaigns.get_fresh(CAMPAIGNS_QUERY) {
            debug!("campaign list served from cache");
            return Ok(list);
        }
        let source = &self.source;
        let list = self.policy.run(|| source.fetch_campaigns()).await?;
        self.campaigns.insert(CAMPAIGNS_QUERY, list.clone());
        Ok(list)
    }

    /// Aggregate insights, cached.
    ///
    /// # Errors
    ///
    /// Returns the last [`ApiError`] once retries are exhausted.
    pub async fn aggregate(&mut self) -> Result<AggregateInsights, ApiError> {
        if let Some(aggregate) = self.aggregate.get_fresh(AGGREGATE_QUERY) {
            debug!("aggregate insights served from cache");
            return Ok(aggregate);
        }
        let source = &self.source;
        let aggregate = self.policy.run(|| source.fetch_aggregate()).await?;
        self.aggregate.insert(AGGREGATE_QUERY, aggregate.clone());
        Ok(aggregate)
    }

    /// Refetches both reads concurrently, ignoring the cache.
    ///
    /// # Errors
    ///
    /// Returns the campaign list error first, then the aggregate error. A read that
    /// succeeded is cached even if the other failed.
    pub async fn refresh(&mut self) -> Result<(CampaignListResponse, AggregateInsights), ApiError> {
        info!("refreshing dashboard");
        self.load(true).await
    }

    /// Overview for `query`, built from cached reads where fresh.
    ///
    /// # Errors
    ///
    /// Returns the first [`ApiError`] among the two reads.
    pub async fn overview(&mut self, query: &str) -> Result<DashboardOverview, ApiError> {
        let (list, aggregate) = self.load(false).await?;
        Ok(DashboardOverview::build(&list, &aggregate, query))
    }

    async fn load(
        &mut self,
        bypass_cache: bool,
    ) -> Result<(CampaignListResponse, AggregateInsights), ApiError> {
        let cached_list = (!bypass_cache)
            .then(|| self.campaigns.get_fresh(CAMPAIGNS_QUERY))
            .flatten();
        let cached_aggregate = (!bypass_cache)
            .then(|| self.aggregate.get_fresh(AGGREGATE_QUERY))
            .flatten();

        let source = &self.source;
        let policy = self.policy;
        let (list, aggregate) = tokio::join!(
            async {
                match cached_list {
                    Some(list) => Ok(list),
                    None => policy.run(|| source.fetch_campaigns()).await,
                }
            },
            async {
                match cached_aggregate {
                    Some(aggregate) => Ok(aggregate),
                    None => policy.run(|| source.fetch_aggregate()).await,
                }
            },
        );

        if let Ok(list) = &list {
            self.campaigns.insert(CAMPAIGNS_QUERY, list.clone());
        }
        if let Ok(aggregate) = &aggregate {
            self.aggregate.insert(AGGREGATE_QUERY, aggregate.clone());
        }
        Ok((list?, aggregate?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::CampaignStatus;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn campaign(id: &str, name: &str, brand: Option<&str>, daily: Option<f64>) -> Campaign {
        Campaign {
            id: id.into(),
            name: name.into(),
            brand_id: brand.map(str::to_string),
            status: Some(CampaignStatus::Active),
            budget: None,
            daily_budget: daily,
            platforms: Some(vec!["Meta".into(), "TikTok".into()]),
            created_at: None,
        }
    }

    fn list(count: usize) -> CampaignListResponse {
        CampaignListResponse {
            campaigns: (0..count)
                .map(|i| {
                    let budget = if i == 1 { None } else { Some(100.0 * (i as f64 + 1.0)) };
                    campaign(&format!("c{i}"), &format!("Campaign {i}"), Some("brand_x"), budget)
                })
                .collect(),
            total: Some(count as u64),
        }
    }

    #[test]
    fn filter_matches_name_brand_and_platforms_case_insensitively() {
        let campaigns = vec![
            campaign("1", "Summer Sale", Some("acme"), None),
            campaign("2", "Winter Push", None, None),
        ];
        let ids = |query: &str| {
            filter_campaigns(&campaigns, query)
                .into_iter()
                .map(|c| c.id.as_str())
                .collect::<Vec<_>>()
        };

        assert_eq!(ids(""), vec!["1", "2"]);
        assert_eq!(ids("SUMMER"), vec!["1"]);
        assert_eq!(ids("acme"), vec!["1"]);
        assert_eq!(ids("tiktok"), vec!["1", "2"]);
        assert!(ids("spring").is_empty());
    }

    #[test]
    fn overview_takes_top_six_and_counts_statuses() {
        let aggregate = AggregateInsights {
            active_campaigns: Some(4),
            paused_campaigns: Some(2),
            ..AggregateInsights::default()
        };
        let overview = DashboardOverview::build(&list(8), &aggregate, "campaign");

        assert_eq!(overview.campaigns.len(), 8);
        assert_eq!(overview.budget_series.name, "Daily Spend");
        assert_eq!(overview.budget_series.categories.len(), TOP_CAMPAIGNS);
        assert_eq!(overview.budget_series.data[..3], [100.0, 0.0, 300.0]);
        assert_eq!(
            overview.status_breakdown,
            StatusBreakdown {
                active: 4,
                paused: 2,
                completed: 0
            }
        );
        assert_eq!(overview.status_breakdown.entries()[2], ("Completed", 0));
    }

    #[derive(Default)]
    struct CountingSource {
        campaign_calls: AtomicU32,
        aggregate_calls: AtomicU32,
        fail_aggregate: bool,
    }

    #[async_trait]
    impl DashboardSource for CountingSource {
        async fn fetch_campaigns(&self) -> Result<CampaignListResponse, ApiError> {
            self.campaign_calls.fetch_add(1, Ordering::SeqCst);
            Ok(list(2))
        }

        async fn fetch_aggregate(&self) -> Result<AggregateInsights, ApiError> {
            self.aggregate_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_aggregate {
                return Err(ApiError::new("boom", 500));
            }
            Ok(AggregateInsights::default())
        }
    }

    #[tokio::test]
    async fn queries_cache_until_refreshed() {
        let source = Arc::new(CountingSource::default());
        let mut queries =
            DashboardQueries::new(Arc::clone(&source), Duration::from_secs(30), RetryPolicy::none());

        queries.overview("").await.unwrap();
        queries.campaigns().await.unwrap();
        queries.aggregate().await.unwrap();
        assert_eq!(source.campaign_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.aggregate_calls.load(Ordering::SeqCst), 1);

        queries.refresh().await.unwrap();
        assert_eq!(source.campaign_calls.load(Ordering::SeqCst), 2);
        assert_eq!(source.aggregate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn partial_failure_still_caches_successful_read() {
        let source = Arc::new(CountingSource {
            fail_aggregate: true,
            ..CountingSource::default()
        });
        let mut queries =
            DashboardQueries::new(Arc::clone(&source), Duration::from_secs(30), RetryPolicy::none());

        let err = queries.overview("").await.unwrap_err();
        assert_eq!(err.status, 500);

        queries.campaigns().await.unwrap();
        assert_eq!(source.campaign_calls.load(Ordering::SeqCst), 1);
    }
}
