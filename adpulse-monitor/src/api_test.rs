//! Tests for [`CampaignsClient`] against a local axum backend.

use crate::{
    api::CampaignsClient,
    overview::DashboardSource,
    snapshot::SnapshotSource,
    transport::SubscriptionKey,
};
use axum::{
    Json, Router,
    extract::Path,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use shared::models::{CampaignStatus, UNKNOWN_ERROR_MESSAGE};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

async fn list_campaigns(headers: HeaderMap) -> impl IntoResponse {
    let authorised = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some("Bearer secret");
    if !authorised {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Missing token" })),
        )
            .into_response();
    }
    Json(json!({
        "campaigns": [
            {
                "id": "camp_001",
                "name": "Summer Sale",
                "brand_id": "brand_1",
                "status": "active",
                "budget": 10000,
                "daily_budget": 500,
                "platforms": ["meta", "google"],
                "created_at": "2024-05-01T00:00:00Z"
            },
            { "id": "camp_002", "name": "Winter", "status": "archived" }
        ],
        "total": 2
    }))
    .into_response()
}

async fn campaign_detail(Path(id): Path<String>) -> impl IntoResponse {
    match id.as_str() {
        "a b" => Json(json!({ "campaign": { "id": id, "name": "Spaced" } })).into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "oops").into_response(),
        "empty" => StatusCode::BAD_GATEWAY.into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Campaign not found" })),
        )
            .into_response(),
    }
}

async fn aggregate() -> impl IntoResponse {
    Json(json!({
        "insights": {
            "timestamp": "2024-05-01T12:00:00Z",
            "total_campaigns": 10,
            "active_campaigns": 6,
            "paused_campaigns": 3,
            "completed_campaigns": 1,
            "total_impressions": 120000,
            "total_spend": 4321.5,
            "avg_ctr": 2.4
        }
    }))
}

async fn campaign_insights(Path(id): Path<String>) -> impl IntoResponse {
    Json(json!({
        "insights": { "campaign_id": id, "impressions": 100, "clicks": 4, "ctr": 4.0 }
    }))
}

async fn spawn_backend() -> Url {
    let router = Router::new()
        .route("/campaigns", get(list_campaigns))
        .route("/campaigns/insights", get(aggregate))
        .route("/campaigns/{id}", get(campaign_detail))
        .route("/campaigns/{id}/insights", get(campaign_insights));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    Url::parse(&format!("http://{addr}/")).unwrap()
}

fn client(base: Url, token: Option<&str>) -> CampaignsClient {
    CampaignsClient::new(base, token.map(str::to_string), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn lists_campaigns_with_bearer_token() {
    let base = spawn_backend().await;

    let response = client(base.clone(), Some("secret"))
        .get_campaigns()
        .await
        .unwrap();
    assert_eq!(response.total, Some(2));
    assert_eq!(response.campaigns[0].status, Some(CampaignStatus::Active));
    assert_eq!(
        response.campaigns[1].status,
        Some(CampaignStatus::Other("archived".into()))
    );
    assert_eq!(response.campaigns[0].daily_budget, Some(500.0));

    let err = client(base, None).get_campaigns().await.unwrap_err();
    assert_eq!(err.status, 401);
    assert_eq!(err.message, "Missing token");
}

#[tokio::test]
async fn detail_encodes_ids_and_normalises_failures() {
    let base = spawn_backend().await;
    let api = client(base, None);

    let campaign = api.get_campaign("a b").await.unwrap();
    assert_eq!(campaign.name, "Spaced");

    let err = api.get_campaign("missing").await.unwrap_err();
    assert_eq!((err.status, err.message.as_str()), (404, "Campaign not found"));

    let err = api.get_campaign("broken").await.unwrap_err();
    assert_eq!(err.status, 500);
    assert_eq!(err.message, "Request failed with status code 500");

    let err = api.get_campaign("empty").await.unwrap_err();
    assert_eq!(err.status, 502);
    assert_ne!(err.message, UNKNOWN_ERROR_MESSAGE);
}

#[tokio::test]
async fn reads_insights_through_trait_seams() {
    let base = spawn_backend().await;
    let api = client(base, None);

    let aggregate = api.fetch_aggregate().await.unwrap();
    assert_eq!(aggregate.active_campaigns, Some(6));
    assert_eq!(aggregate.total_spend, Some(4321.5));
    assert_eq!(aggregate.avg_cpc, None);

    let snapshot = api
        .fetch_snapshot(&SubscriptionKey::from("camp_001"))
        .await
        .unwrap();
    assert!(snapshot.describes("camp_001"));
    assert_eq!(snapshot.impressions, Some(100.0));
    assert_eq!(snapshot.spend, None);
}

#[tokio::test]
async fn unreachable_backend_reports_status_zero() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = client(Url::parse(&format!("http://{addr}")).unwrap(), None);
    let err = api.get_aggregate_insights().await.unwrap_err();
    assert!(err.is_transport());
    assert!(!err.message.is_empty());
}
