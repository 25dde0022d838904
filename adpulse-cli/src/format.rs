//! Display helpers for metric values. Anything unknown renders as `-`, never `0`.

use chrono::{DateTime, Local};
use monitor::ReconciledView;
use shared::models::CampaignInsight;

/// Placeholder for an unknown value.
pub const MISSING: &str = "-";

/// Groups the integer part with commas and keeps at most three decimals.
#[must_use]
pub fn number(value: Option<f64>) -> String {
    let Some(value) = value.filter(|v| v.is_finite()) else {
        return MISSING.to_string();
    };

    let rendered = format!("{:.3}", value.abs());
    let (int_part, fraction) = rendered.split_once('.').unwrap_or((rendered.as_str(), ""));
    let fraction = fraction.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (index, digit) in int_part.chars().enumerate() {
        if index > 0 && (int_part.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && (grouped != "0" || !fraction.is_empty()) {
        "-"
    } else {
        ""
    };
    if fraction.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{fraction}")
    }
}

/// Whole counts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn count(value: Option<u64>) -> String {
    number(value.map(|v| v as f64))
}

/// Dollar amounts.
#[must_use]
pub fn currency(value: Option<f64>) -> String {
    match value {
        Some(_) => format!("${}", number(value)),
        None => MISSING.to_string(),
    }
}

/// Percentages given in percent units.
#[must_use]
pub fn percent(value: Option<f64>) -> String {
    match value {
        Some(_) => format!("{}%", number(value)),
        None => MISSING.to_string(),
    }
}

/// RFC 3339 timestamps in local time; other text is shown as received.
#[must_use]
pub fn timestamp(value: Option<&str>) -> String {
    match value {
        Some(raw) => DateTime::parse_from_rfc3339(raw).map_or_else(
            |_| raw.to_string(),
            |parsed| {
                parsed
                    .with_timezone(&Local)
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
            },
        ),
        None => MISSING.to_string(),
    }
}

/// One-line summary of a campaign metric record.
#[must_use]
pub fn metric_line(metric: &CampaignInsight) -> String {
    format!(
        "impressions {} | clicks {} | conversions {} | spend {} | ctr {} | cpc {} | conv. rate {} | at {}",
        number(metric.impressions),
        number(metric.clicks),
        number(metric.conversions),
        currency(metric.spend),
        percent(metric.ctr),
        currency(metric.cpc),
        percent(metric.conversion_rate),
        timestamp(metric.timestamp.as_deref()),
    )
}

/// One-line rendering of a reconciled view for `campaign`.
#[must_use]
pub fn view_line(campaign: &str, view: &ReconciledView) -> String {
    match view {
        ReconciledView::Empty => "no campaign selected".to_string(),
        ReconciledView::Loading => format!("{campaign}: loading..."),
        ReconciledView::Value { metric, source } => {
            format!("{campaign} [{source}] {}", metric_line(metric))
        }
        ReconciledView::Errored { error, last_known } => {
            let status = error
                .status
                .map(|status| format!(" (status {status})"))
                .unwrap_or_default();
            let last = last_known
                .as_ref()
                .map(|metric| format!(" | last known: {}", metric_line(metric)))
                .unwrap_or_default();
            format!("{campaign} [error] {}{status}{last}", error.message)
        }
    }
}
