//! Merges live and snapshot metrics into the one value presentation shows.

use crate::{snapshot::SnapshotState, transport::SubscriptionKey};
use serde::Serialize;
use shared::models::{CampaignInsight, StreamError};
use std::fmt;

/// Where a displayed metric came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewSource {
    /// Pushed on the live stream.
    Live,
    /// Fetched once.
    Snapshot,
}

impl fmt::Display for ViewSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Live => "live",
            Self::Snapshot => "snapshot",
        })
    }
}

/// The merged state handed to presentation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ReconciledView {
    /// No campaign is selected.
    Empty,
    /// A campaign is selected and nothing is known about it yet.
    Loading,
    /// A metric to display.
    Value {
        /// The record.
        metric: CampaignInsight,
        /// Its origin.
        source: ViewSource,
    },
    /// Something failed. The last good value, if any, stays visible next to the error.
    Errored {
        /// What failed.
        error: StreamError,
        /// Most recent value known for the selected campaign.
        last_known: Option<CampaignInsight>,
    },
}

impl ReconciledView {
    /// The metric worth rendering, whether current or last known.
    #[must_use]
    pub fn metric(&self) -> Option<&CampaignInsight> {
        match self {
            Self::Value { metric, .. } => Some(metric),
            Self::Errored { last_known, .. } => last_known.as_ref(),
            Self::Empty | Self::Loading => None,
        }
    }

    /// Source of a [`ReconciledView::Value`].
    #[must_use]
    pub const fn source(&self) -> Option<ViewSource> {
        match self {
            Self::Value { source, .. } => Some(*source),
            _ => None,
        }
    }

    /// The error of a [`ReconciledView::Errored`].
    #[must_use]
    pub const fn error(&self) -> Option<&StreamError> {
        match self {
            Self::Errored { error, .. } => Some(error),
            _ => None,
        }
    }
}

/// Everything the reconciler looks at.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileInput<'a> {
    /// Selected campaign.
    pub selected_key: Option<&'a SubscriptionKey>,
    /// Most recent accepted live record for the selected campaign.
    pub live: Option<&'a CampaignInsight>,
    /// Snapshot request state for the selected campaign.
    pub snapshot: &'a SnapshotState,
    /// Most recent stream failure for the selected campaign.
    pub stream_error: Option<&'a StreamError>,
}

/// Computes the view.
///
/// Precedence, first match wins:
///
/// 1. no selection: [`ReconciledView::Empty`]
/// 2. a stream error: [`ReconciledView::Errored`] keeping the live value, else the snapshot
/// 3. a live record: [`ReconciledView::Value`] from [`ViewSource::Live`]
/// 4. a loaded snapshot: [`ReconciledView::Value`] from [`ViewSource::Snapshot`]
/// 5. a snapshot not yet resolved: [`ReconciledView::Loading`]
/// 6. a failed snapshot: [`ReconciledView::Errored`] with nothing to keep
#[must_use]
pub fn reconcile(input: ReconcileInput<'_>) -> ReconciledView {
    if input.selected_key.is_none() {
        return ReconciledView::Empty;
    }

    if let Some(error) = input.stream_error {
        return ReconciledView::Errored {
            error: error.clone(),
            last_known: input.live.or_else(|| input.snapshot.loaded()).cloned(),
        };
    }

    if let Some(metric) = input.live {
        return ReconciledView::Value {
            metric: metric.clone(),
            source: ViewSource::Live,
        };
    }

    match input.snapshot {
        SnapshotState::Loaded(metric) => ReconciledView::Value {
            metric: metric.clone(),
            source: ViewSource::Snapshot,
        },
        SnapshotState::Idle | SnapshotState::Loading => ReconciledView::Loading,
        SnapshotState::Failed(err) => ReconciledView::Errored {
            error: StreamError::from(err),
            last_known: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::ApiError;

    fn metric(impressions: f64) -> CampaignInsight {
        CampaignInsight {
            campaign_id: Some("X".into()),
            impressions: Some(impressions),
            ..CampaignInsight::default()
        }
    }

    fn view(
        key: Option<&SubscriptionKey>,
        live: Option<&CampaignInsight>,
        snapshot: &SnapshotState,
        stream_error: Option<&StreamError>,
    ) -> ReconciledView {
        reconcile(ReconcileInput {
            selected_key: key,
            live,
            snapshot,
            stream_error,
        })
    }

    #[test]
    fn no_selection_is_empty_whatever_else_is_known() {
        let live = metric(1.0);
        let error = StreamError::connection("");
        let snapshot = SnapshotState::Loaded(metric(2.0));
        assert_eq!(view(None, Some(&live), &snapshot, Some(&error)), ReconciledView::Empty);
    }

    #[test]
    fn loading_until_snapshot_or_live_arrives() {
        let key = SubscriptionKey::from("X");
        assert_eq!(view(Some(&key), None, &SnapshotState::Loading, None), ReconciledView::Loading);
        assert_eq!(view(Some(&key), None, &SnapshotState::Idle, None), ReconciledView::Loading);
    }

    #[test]
    fn loaded_snapshot_is_shown() {
        let key = SubscriptionKey::from("X");
        let snapshot = SnapshotState::Loaded(metric(100.0));
        let result = view(Some(&key), None, &snapshot, None);
        assert_eq!(result.source(), Some(ViewSource::Snapshot));
        assert_eq!(result.metric().unwrap().impressions, Some(100.0));
    }

    #[test]
    fn live_beats_any_snapshot() {
        let key = SubscriptionKey::from("X");
        let live = metric(150.0);
        for snapshot in [
            SnapshotState::Loaded(metric(100.0)),
            SnapshotState::Loaded(metric(175.0)),
            SnapshotState::Loading,
            SnapshotState::Failed(ApiError::new("down", 500)),
        ] {
            let result = view(Some(&key), Some(&live), &snapshot, None);
            assert_eq!(result.source(), Some(ViewSource::Live));
            assert_eq!(result.metric().unwrap().impressions, Some(150.0));
        }
    }

    #[test]
    fn failed_snapshot_without_live_is_errored() {
        let key = SubscriptionKey::from("X");
        let snapshot = SnapshotState::Failed(ApiError::new("Campaign not found", 404));
        let ReconciledView::Errored { error, last_known } = view(Some(&key), None, &snapshot, None)
        else {
            panic!("expected errored view");
        };
        assert_eq!(error.status, Some(404));
        assert_eq!(error.message, "Campaign not found");
        assert!(last_known.is_none());
    }

    #[test]
    fn stream_error_keeps_last_known_value() {
        let key = SubscriptionKey::from("X");
        let error = StreamError::parse_failure("garbage");
        let live = metric(150.0);
        let snapshot = SnapshotState::Loaded(metric(100.0));

        let with_live = view(Some(&key), Some(&live), &snapshot, Some(&error));
        assert_eq!(with_live.error(), Some(&error));
        assert_eq!(with_live.metric().unwrap().impressions, Some(150.0));

        let with_snapshot = view(Some(&key), None, &snapshot, Some(&error));
        assert_eq!(with_snapshot.metric().unwrap().impressions, Some(100.0));

        let with_nothing = view(Some(&key), None, &SnapshotState::Loading, Some(&error));
        assert!(with_nothing.metric().is_none());
        assert!(with_nothing.error().is_some());
    }

    #[test]
    fn view_serialises_with_state_tag() {
        let value = serde_json::to_value(ReconciledView::Value {
            metric: metric(5.0),
            source: ViewSource::Live,
        })
        .unwrap();
        assert_eq!(value["state"], "value");
        assert_eq!(value["source"], "live");
        assert_eq!(value["metric"]["impressions"], 5.0);
    }
}
