use serde::{Deserialize, Serialize};

/// Per-campaign performance metrics.
///
/// The same shape is used for the one-shot snapshot (`GET /campaigns/{id}/insights`)
/// and for every frame pushed on the live stream. Every metric is optional: an
/// absent field means "not yet known" and must never be rendered as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CampaignInsight {
    /// Campaign the metrics describe. Live frames are matched against the
    /// subscribed campaign using this field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    /// Origin timestamp of the measurement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Ad impressions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impressions: Option<f64>,
    /// Clicks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clicks: Option<f64>,
    /// Conversions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversions: Option<f64>,
    /// Spend in account currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spend: Option<f64>,
    /// Click-through rate, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctr: Option<f64>,
    /// Cost per click.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpc: Option<f64>,
    /// Conversion rate, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion_rate: Option<f64>,
}

impl CampaignInsight {
    /// Whether the embedded campaign reference equals `campaign_id`.
    #[must_use]
    pub fn describes(&self, campaign_id: &str) -> bool {
        self.campaign_id.as_deref() == Some(campaign_id)
    }
}

/// Response body of `GET /campaigns/{id}/insights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignInsightsResponse {
    /// Last known metrics for the campaign.
    pub insights: CampaignInsight,
}

/// Account-wide totals across all campaigns.
///
/// Like [`CampaignInsight`], a missing total is unknown rather than zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateInsights {
    /// When the totals were computed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Number of campaigns in the account.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_campaigns: Option<u64>,
    /// Campaigns currently serving.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_campaigns: Option<u64>,
    /// Campaigns paused by the advertiser.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_campaigns: Option<u64>,
    /// Campaigns past their end date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_campaigns: Option<u64>,
    /// Impressions summed over all campaigns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_impressions: Option<f64>,
    /// Clicks summed over all campaigns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_clicks: Option<f64>,
    /// Conversions summed over all campaigns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_conversions: Option<f64>,
    /// Spend summed over all campaigns, in account currency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_spend: Option<f64>,
    /// Mean click-through rate, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_ctr: Option<f64>,
    /// Mean cost per click.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_cpc: Option<f64>,
    /// Mean conversion rate, percent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_conversion_rate: Option<f64>,
}

/// Response body of `GET /campaigns/insights`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateInsightsResponse {
    /// Totals across every campaign.
    pub insights: AggregateInsights,
}
