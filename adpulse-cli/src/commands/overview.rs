use std::sync::Arc;

use anyhow::{Context, Result};
use monitor::{
    api::CampaignsClient,
    overview::{BudgetSeries, DashboardOverview, DashboardQueries, StatusBreakdown},
};
use shared::config::Config;

use super::insights::render_aggregate;
use crate::format;

pub async fn show_overview(config: &Config, query: Option<&str>) -> Result<()> {
    let client = Arc::new(CampaignsClient::from_config(config)?);
    let mut queries = DashboardQueries::from_config(client, config);

    let overview = queries
        .overview(query.unwrap_or_default())
        .await
        .context("failed to load dashboard")?;
    render_overview(&overview);
    Ok(())
}

fn render_overview(overview: &DashboardOverview) {
    render_aggregate(&overview.aggregate);

    println!();
    println!("Campaign status");
    for line in status_lines(&overview.status_breakdown) {
        println!("  {line}");
    }

    println!();
    println!("{}", overview.budget_series.name);
    for line in budget_lines(&overview.budget_series) {
        println!("  {line}");
    }

    println!();
    if overview.campaigns.is_empty() {
        println!("No campaigns match.");
        return;
    }
    let shown = overview.campaigns.len();
    match overview.total {
        Some(total) => println!("Campaigns ({shown} of {total})"),
        None => println!("Campaigns ({shown})"),
    }
    for campaign in &overview.campaigns {
        println!(
            "  - {} [{}] {}",
            campaign.name,
            campaign.id,
            format::currency(campaign.daily_budget)
        );
    }
}

fn status_lines(breakdown: &StatusBreakdown) -> Vec<String> {
    breakdown
        .entries()
        .iter()
        .map(|(label, count)| format!("{label:<10} {count}"))
        .collect()
}

fn budget_lines(series: &BudgetSeries) -> Vec<String> {
    if series.categories.is_empty() {
        return vec!["(no campaigns)".to_string()];
    }
    let width = series
        .categories
        .iter()
        .map(|name| name.chars().count())
        .max()
        .unwrap_or(0);
    series
        .categories
        .iter()
        .zip(&series.data)
        .map(|(name, value)| format!("{name:<width$}  {}", format::currency(Some(*value))))
        .collect()
}
