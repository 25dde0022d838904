use std::sync::Arc;

use anyhow::{Context, Result};
use monitor::{
    api::CampaignsClient,
    cache::RetryPolicy,
    overview::{DashboardQueries, filter_campaigns},
};
use shared::{
    config::Config,
    models::{Campaign, CampaignInsight},
};
use tracing::warn;

use crate::format;

pub async fn list_campaigns(config: &Config, query: Option<&str>) -> Result<()> {
    let client = Arc::new(CampaignsClient::from_config(config)?);
    let mut queries = DashboardQueries::from_config(client, config);

    let list = queries
        .campaigns()
        .await
        .context("failed to fetch campaigns")?;
    let matches = filter_campaigns(&list.campaigns, query.unwrap_or_default());
    render_campaign_table(&matches);

    if let Some(total) = list.total {
        println!("\n{} of {} campaigns", matches.len(), total);
    }
    Ok(())
}

pub async fn show_campaign(config: &Config, id: &str) -> Result<()> {
    let client = CampaignsClient::from_config(config)?;
    let policy = RetryPolicy::from_config(config);

    let campaign = policy
        .run(|| client.get_campaign(id))
        .await
        .with_context(|| format!("failed to fetch campaign {id}"))?;
    render_campaign(&campaign);

    // Detail is still useful when the metrics read fails.
    match policy.run(|| client.get_campaign_insights(id)).await {
        Ok(insight) => render_insight(&insight),
        Err(err) => {
            warn!(campaign = id, status = err.status, "campaign insights unavailable");
            eprintln!("warning: failed to fetch insights for {id}: {err}");
        }
    }
    Ok(())
}

fn render_campaign_table(campaigns: &[&Campaign]) {
    if campaigns.is_empty() {
        println!("No campaigns found.");
        return;
    }

    println!(
        "{:<14} {:<28} {:<10} {:>14}  PLATFORMS",
        "ID", "NAME", "STATUS", "DAILY BUDGET"
    );
    for campaign in campaigns {
        println!(
            "{:<14} {:<28} {:<10} {:>14}  {}",
            campaign.id,
            campaign.name,
            status_label(campaign),
            format::currency(campaign.daily_budget),
            platforms(campaign),
        );
    }
}

fn render_campaign(campaign: &Campaign) {
    println!("{} ({})", campaign.name, campaign.id);
    println!("  status:       {}", status_label(campaign));
    println!(
        "  brand:        {}",
        campaign.brand_id.as_deref().unwrap_or(format::MISSING)
    );
    println!("  budget:       {}", format::currency(campaign.budget));
    println!("  daily budget: {}", format::currency(campaign.daily_budget));
    println!("  platforms:    {}", platforms(campaign));
    println!(
        "  created:      {}",
        format::timestamp(campaign.created_at.as_deref())
    );
}

fn render_insight(insight: &CampaignInsight) {
    println!();
    println!("Latest metrics ({})", format::timestamp(insight.timestamp.as_deref()));
    println!("  impressions:     {}", format::number(insight.impressions));
    println!("  clicks:          {}", format::number(insight.clicks));
    println!("  conversions:     {}", format::number(insight.conversions));
    println!("  spend:           {}", format::currency(insight.spend));
    println!("  ctr:             {}", format::percent(insight.ctr));
    println!("  cpc:             {}", format::currency(insight.cpc));
    println!("  conversion rate: {}", format::percent(insight.conversion_rate));
}

fn status_label(campaign: &Campaign) -> String {
    campaign
        .status
        .as_ref()
        .map_or_else(|| format::MISSING.to_string(), ToString::to_string)
}

fn platforms(campaign: &Campaign) -> String {
    match campaign.platforms.as_deref() {
        Some(list) if !list.is_empty() => list.join(", "),
        _ => format::MISSING.to_string(),
    }
}
