//! Mutable inputs of the reconciler for the selected campaign.

use crate::{
    reconcile::{ReconcileInput, ReconciledView, reconcile},
    snapshot::SnapshotState,
    subscription::SubscriptionUpdate,
    transport::SubscriptionKey,
};
use shared::models::{ApiError, CampaignInsight, StreamError};
use tracing::debug;

/// Selected key plus the live, snapshot and error state recorded for it.
///
/// Everything is scoped to the selected key: selecting a different key wipes the live
/// value and the stream error before anything else can read them, and updates or
/// snapshot results tagged with any other key are ignored.
#[derive(Debug, Clone, Default)]
pub struct MetricState {
    selected: Option<SubscriptionKey>,
    live: Option<CampaignInsight>,
    snapshot: SnapshotState,
    stream_error: Option<StreamError>,
}

impl MetricState {
    /// Empty state with nothing selected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected key.
    #[must_use]
    pub const fn selected(&self) -> Option<&SubscriptionKey> {
        self.selected.as_ref()
    }

    /// Latest accepted live record.
    #[must_use]
    pub const fn live(&self) -> Option<&CampaignInsight> {
        self.live.as_ref()
    }

    /// Snapshot request state.
    #[must_use]
    pub const fn snapshot(&self) -> &SnapshotState {
        &self.snapshot
    }

    /// Latest stream error.
    #[must_use]
    pub const fn stream_error(&self) -> Option<&StreamError> {
        self.stream_error.as_ref()
    }

    /// Changes the selection. Returns whether the key actually changed.
    ///
    /// A change clears the live value and stream error and marks the snapshot as
    /// loading (or idle for no selection).
    pub fn select(&mut self, key: Option<SubscriptionKey>) -> bool {
        if self.selected == key {
            return false;
        }
        self.live = None;
        self.stream_error = None;
        self.snapshot = if key.is_some() {
            SnapshotState::Loading
        } else {
            SnapshotState::Idle
        };
        self.selected = key;
        true
    }

    fn is_selected(&self, key: &SubscriptionKey) -> bool {
        self.selected.as_ref() == Some(key)
    }

    /// Marks the snapshot for the selected key as in flight.
    ///
    /// A loaded snapshot stays visible while it is being refreshed.
    pub fn begin_snapshot(&mut self) {
        if self.selected.is_some() && self.snapshot.loaded().is_none() {
            self.snapshot = SnapshotState::Loading;
        }
    }

    /// Applies a subscription update. Returns whether anything changed.
    pub fn apply_update(&mut self, update: SubscriptionUpdate) -> bool {
        if !self.is_selected(update.key()) {
            debug!(key = %update.key(), "ignoring update for unselected key");
            return false;
        }
        match update {
            SubscriptionUpdate::Connected { .. } => self.stream_error.take().is_some(),
            SubscriptionUpdate::Metric { metric, .. } => {
                self.live = Some(metric);
                self.stream_error = None;
                true
            }
            SubscriptionUpdate::Error { error, .. } => {
                self.stream_error = Some(error);
                true
            }
        }
    }

    /// Records a snapshot result. Returns whether it was for the selected key.
    pub fn apply_snapshot(
        &mut self,
        key: &SubscriptionKey,
        result: Result<CampaignInsight, ApiError>,
    ) -> bool {
        if !self.is_selected(key) {
            debug!(key = %key, "ignoring snapshot for unselected key");
            return false;
        }
        self.snapshot = SnapshotState::from_result(result);
        true
    }

    /// The reconciled view of the current state.
    #[must_use]
    pub fn view(&self) -> ReconciledView {
        reconcile(ReconcileInput {
            selected_key: self.selected.as_ref(),
            live: self.live.as_ref(),
            snapshot: &self.snapshot,
            stream_error: self.stream_error.as_ref(),
        })
    }
}
