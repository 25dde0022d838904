//! Wire models for the campaign REST endpoints and the per-campaign insight stream.

pub mod campaign;
pub mod errors;
pub mod insights;

pub use campaign::{Campaign, CampaignDetailResponse, CampaignListResponse, CampaignStatus};
pub use errors::{
    ApiError, CONNECTION_ERROR_MESSAGE, PARSE_FAILURE_MESSAGE, StreamError, UNKNOWN_ERROR_MESSAGE,
};
pub use insights::{
    AggregateInsights, AggregateInsightsResponse, CampaignInsight, CampaignInsightsResponse,
};
