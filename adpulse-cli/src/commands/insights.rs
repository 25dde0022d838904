use std::sync::Arc;

use anyhow::{Context, Result};
use monitor::{api::CampaignsClient, overview::DashboardQueries};
use shared::{config::Config, models::AggregateInsights};

use crate::format;

pub async fn show_insights(config: &Config) -> Result<()> {
    let client = Arc::new(CampaignsClient::from_config(config)?);
    let mut queries = DashboardQueries::from_config(client, config);

    let aggregate = queries
        .aggregate()
        .await
        .context("failed to fetch aggregate insights")?;
    render_aggregate(&aggregate);
    Ok(())
}

/// Account totals as `(label, value)` rows.
pub(crate) fn aggregate_rows(aggregate: &AggregateInsights) -> Vec<(&'static str, String)> {
    vec![
        ("Total campaigns", format::count(aggregate.total_campaigns)),
        ("Active campaigns", format::count(aggregate.active_campaigns)),
        ("Impressions", format::number(aggregate.total_impressions)),
        ("Clicks", format::number(aggregate.total_clicks)),
        ("Conversions", format::number(aggregate.total_conversions)),
        ("Spend", format::currency(aggregate.total_spend)),
        ("Avg. CTR", format::percent(aggregate.avg_ctr)),
        ("Avg. CPC", format::currency(aggregate.avg_cpc)),
        (
            "Avg. conversion rate",
            format::percent(aggregate.avg_conversion_rate),
        ),
    ]
}

pub(crate) fn render_aggregate(aggregate: &AggregateInsights) {
    println!(
        "Account insights ({})",
        format::timestamp(aggregate.timestamp.as_deref())
    );
    for (label, value) in aggregate_rows(aggregate) {
        println!("  {label:<22} {value}");
    }
}
