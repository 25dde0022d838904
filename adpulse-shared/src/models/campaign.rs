use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state reported for a campaign.
///
/// The backend is free to introduce new states, so anything that is not one of
/// the three known values is preserved verbatim in [`CampaignStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CampaignStatus {
    /// Currently delivering.
    Active,
    /// Temporarily halted by the advertiser.
    Paused,
    /// Reached its end date or budget.
    Completed,
    /// A status this client does not know about.
    Other(String),
}

impl CampaignStatus {
    /// Returns the wire representation of the status.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Other(value) => value,
        }
    }
}

impl From<String> for CampaignStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "active" => Self::Active,
            "paused" => Self::Paused,
            "completed" => Self::Completed,
            _ => Self::Other(value),
        }
    }
}

impl From<CampaignStatus> for String {
    fn from(value: CampaignStatus) -> Self {
        match value {
            CampaignStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An advertising campaign as returned by `GET /campaigns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    /// Campaign identifier; doubles as the live subscription key.
    pub id: String,
    /// Human readable campaign name.
    pub name: String,
    /// Owning brand, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
    /// Lifecycle state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<CampaignStatus>,
    /// Total budget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub budget: Option<f64>,
    /// Daily budget cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_budget: Option<f64>,
    /// Ad platforms the campaign runs on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platforms: Option<Vec<String>>,
    /// Creation timestamp as sent by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Campaign {
    /// Text used by the dashboard search box: name, brand and platforms.
    #[must_use]
    pub fn search_text(&self) -> String {
        let platforms = self
            .platforms
            .as_ref()
            .map(|list| list.join(" "))
            .unwrap_or_default();
        format!(
            "{} {} {}",
            self.name,
            self.brand_id.as_deref().unwrap_or_default(),
            platforms
        )
    }
}

/// Response body of `GET /campaigns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignListResponse {
    /// Campaigns visible to the caller.
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
    /// Total count reported by the backend, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Response body of `GET /campaigns/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDetailResponse {
    /// The requested campaign.
    pub campaign: Campaign,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_and_unknown_values() {
        let parsed: Vec<CampaignStatus> =
            serde_json::from_str(r#"["active","paused","completed","archived"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![
                CampaignStatus::Active,
                CampaignStatus::Paused,
                CampaignStatus::Completed,
                CampaignStatus::Other("archived".into()),
            ]
        );
        assert_eq!(
            serde_json::to_string(&CampaignStatus::Other("archived".into())).unwrap(),
            "\"archived\""
        );
    }

    #[test]
    fn campaign_with_only_required_fields() {
        let campaign: Campaign = serde_json::from_str(r#"{"id":"c1","name":"Summer Sale"}"#).unwrap();
        assert_eq!(campaign.id, "c1");
        assert!(campaign.status.is_none());
        assert!(campaign.daily_budget.is_none());
        assert_eq!(campaign.search_text(), "Summer Sale  ");
    }

    #[test]
    fn search_text_includes_brand_and_platforms() {
        let campaign: Campaign = serde_json::from_str(
            r#"{"id":"c2","name":"Holiday","brand_id":"acme","platforms":["meta","youtube"]}"#,
        )
        .unwrap();
        assert_eq!(campaign.search_text(), "Holiday acme meta youtube");
    }

    #[test]
    fn list_response_tolerates_missing_total() {
        let list: CampaignListResponse =
            serde_json::from_str(r#"{"campaigns":[{"id":"c1","name":"A","status":"paused"}]}"#)
                .unwrap();
        assert_eq!(list.campaigns.len(), 1);
        assert_eq!(list.campaigns[0].status, Some(CampaignStatus::Paused));
        assert_eq!(list.total, None);
    }
}
