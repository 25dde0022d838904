//! REST client for the campaign backend.

use crate::{
    error::{MonitorError, MonitorResult},
    transport::SubscriptionKey,
};
use reqwest::{Client, header::ACCEPT};
use serde::de::DeserializeOwned;
use shared::{
    config::Config,
    models::{
        AggregateInsights, AggregateInsightsResponse, ApiError, Campaign, CampaignDetailResponse,
        CampaignInsight, CampaignInsightsResponse, CampaignListResponse,
    },
};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Appends percent-encoded path segments to `base`, dropping any query or fragment.
fn endpoint(base: &Url, segments: &[&str]) -> MonitorResult<Url> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| MonitorError::invalid_url(base.as_str(), "URL cannot be a base"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

/// URL of the live metric stream for one campaign.
///
/// # Errors
///
/// Returns [`MonitorError::InvalidUrl`] if `base` cannot carry a path.
pub fn stream_url(base: &Url, key: &SubscriptionKey) -> MonitorResult<Url> {
    endpoint(base, &["campaigns", key.as_str(), "insights", "stream"])
}

/// Typed access to the one-shot campaign endpoints.
///
/// Every failure is normalised into an [`ApiError`]. The bearer token, when configured,
/// is attached to each request.
#[derive(Debug, Clone)]
pub struct CampaignsClient {
    base_url: Url,
    client: Client,
    access_token: Option<String>,
}

impl CampaignsClient {
    /// Builds a client with its own connection pool and per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Client`] if the HTTP client cannot be built, or
    /// [`MonitorError::InvalidUrl`] if `base_url` cannot carry endpoint paths.
    pub fn new(
        base_url: Url,
        access_token: Option<String>,
        timeout: Duration,
    ) -> MonitorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(MonitorError::Client)?;
        Self::with_client(client, base_url, access_token)
    }

    /// Wraps an existing HTTP client.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidUrl`] if `base_url` cannot carry endpoint paths.
    pub fn with_client(
        client: Client,
        base_url: Url,
        access_token: Option<String>,
    ) -> MonitorResult<Self> {
        if base_url.cannot_be_a_base() {
            return Err(MonitorError::invalid_url(
                base_url.as_str(),
                "URL cannot be a base",
            ));
        }
        Ok(Self {
            base_url,
            client,
            access_token,
        })
    }

    /// Builds a client from loaded configuration.
    ///
    /// # Errors
    ///
    /// See [`CampaignsClient::new`].
    pub fn from_config(config: &Config) -> MonitorResult<Self> {
        Self::new(
            config.api.base_url.clone(),
            config.api.access_token.clone(),
            config.request_timeout(),
        )
    }

    /// `GET /campaigns`
    ///
    /// # Errors
    ///
    /// Returns the normalised [`ApiError`] for any failed request.
    pub async fn get_campaigns(&self) -> Result<CampaignListResponse, ApiError> {
        self.get_json(&["campaigns"]).await
    }

    /// `GET /campaigns/{id}`
    ///
    /// # Errors
    ///
    /// Returns the normalised [`ApiError`] for any failed request.
    pub async fn get_campaign(&self, id: &str) -> Result<Campaign, ApiError> {
        let response: CampaignDetailResponse = self.get_json(&["campaigns", id]).await?;
        Ok(response.campaign)
    }

    /// `GET /campaigns/insights`
    ///
    /// # Errors
    ///
    /// Returns the normalised [`ApiError`] for any failed request.
    pub async fn get_aggregate_insights(&self) -> Result<AggregateInsights, ApiError> {
        let response: AggregateInsightsResponse =
            self.get_json(&["campaigns", "insights"]).await?;
        Ok(response.insights)
    }

    /// `GET /campaigns/{id}/insights`
    ///
    /// # Errors
    ///
    /// Returns the normalised [`ApiError`] for any failed request.
    pub async fn get_campaign_insights(&self, id: &str) -> Result<CampaignInsight, ApiError> {
        let response: CampaignInsightsResponse =
            self.get_json(&["campaigns", id, "insights"]).await?;
        Ok(response.insights)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = endpoint(&self.base_url, segments)
            .map_err(|err| ApiError::new(err.to_string(), 0))?;
        debug!(url = %url, "GET");

        let mut request = self.client.get(url.clone()).header(ACCEPT, "application/json");
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|err| {
            warn!(url = %url, error = %err, "request failed before a response arrived");
            ApiError::new(err.to_string(), 0)
        })?;

        let success = response.status().is_success();
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| ApiError::new(err.to_string(), status))?;

        if !success {
            let fallback = format!("Request failed with status code {status}");
            let err = ApiError::from_response_body(status, &body, Some(&fallback));
            warn!(url = %url, status, message = %err.message, "request rejected");
            return Err(err);
        }

        serde_json::from_str(&body)
            .map_err(|err| ApiError::new(format!("invalid response body: {err}"), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_encode_ids_and_respect_base_path() {
        let base = Url::parse("https://api.example.com/v1/").unwrap();
        let url = endpoint(&base, &["campaigns", "a b/c"]).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/v1/campaigns/a%20b%2Fc");

        let base = Url::parse("https://api.example.com?x=1").unwrap();
        let url = stream_url(&base, &"c-1".into()).unwrap();
        assert_eq!(url.as_str(), "https://api.example.com/campaigns/c-1/insights/stream");
    }

    #[test]
    fn rejects_urls_without_a_path() {
        let base = Url::parse("mailto:ops@example.com").unwrap();
        assert!(matches!(
            stream_url(&base, &"c1".into()),
            Err(MonitorError::InvalidUrl { .. })
        ));
        assert!(CampaignsClient::with_client(Client::new(), base, None).is_err());
    }
}
