//! Event loop tying subscription, snapshot and reconciliation together.

use crate::{
    reconcile::ReconciledView,
    snapshot::{SnapshotFetcher, SnapshotSource, SnapshotState},
    state::MetricState,
    subscription::{SubscriptionChange, SubscriptionManager},
    transport::{SubscriptionKey, Transport},
};
use shared::{
    config::Config,
    models::{ApiError, CampaignInsight},
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info};

type SnapshotResult = (SubscriptionKey, Result<CampaignInsight, ApiError>);

/// Live monitor for one selected campaign at a time.
///
/// All state changes happen on the task that awaits [`MonitorSession::next_view`], so
/// stream updates and snapshot results are applied strictly one after another.
/// Snapshot fetches run on spawned tasks; [`MonitorSession::select`] must therefore be
/// called from within a Tokio runtime.
#[derive(Debug)]
pub struct MonitorSession<T, S> {
    subscriptions: SubscriptionManager<T>,
    snapshots: SnapshotFetcher<S>,
    state: MetricState,
    snapshot_tx: mpsc::UnboundedSender<SnapshotResult>,
    snapshot_rx: mpsc::UnboundedReceiver<SnapshotResult>,
    fetch: Option<JoinHandle<()>>,
}

impl<T, S> MonitorSession<T, S>
where
    T: Transport,
    S: SnapshotSource + 'static,
{
    /// Assembles a session from its parts.
    pub fn new(subscriptions: SubscriptionManager<T>, snapshots: SnapshotFetcher<S>) -> Self {
        let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
        Self {
            subscriptions,
            snapshots,
            state: MetricState::new(),
            snapshot_tx,
            snapshot_rx,
            fetch: None,
        }
    }

    /// Builds a session with configured queue size, freshness window and retries.
    pub fn from_config(transport: T, source: Arc<S>, config: &Config) -> Self {
        Self::new(
            SubscriptionManager::from_config(transport, config),
            SnapshotFetcher::from_config(source, config),
        )
    }

    /// Current view.
    #[must_use]
    pub fn view(&self) -> ReconciledView {
        self.state.view()
    }

    /// Reconciler inputs.
    pub const fn state(&self) -> &MetricState {
        &self.state
    }

    /// The subscription manager.
    pub const fn subscriptions(&self) -> &SubscriptionManager<T> {
        &self.subscriptions
    }

    /// Selects a campaign, or nothing.
    ///
    /// The live subscription follows the selection. When the key actually changes the
    /// previous campaign's values are cleared and its snapshot is requested.
    pub fn select(&mut self, key: Option<SubscriptionKey>) -> SubscriptionChange {
        let change = self.subscriptions.set_subscription(key.clone());
        if self.state.select(key) {
            self.cancel_fetch();
            if self.state.selected().is_some() {
                self.spawn_fetch(false);
            }
        }
        change
    }

    /// Retries whatever failed for the selected campaign.
    ///
    /// Re-opens the live channel if it was closed by an error and refetches the snapshot
    /// if it failed. Returns `None` when nothing is selected.
    pub fn retry(&mut self) -> Option<SubscriptionChange> {
        let key = self.state.selected().cloned()?;
        info!(key = %key, "retrying");
        let change = self.subscriptions.set_subscription(Some(key));
        if matches!(self.state.snapshot(), SnapshotState::Failed(_)) {
            self.spawn_fetch(true);
        }
        Some(change)
    }

    /// Fetches the selected campaign's snapshot again, bypassing the cache.
    pub fn refresh_snapshot(&mut self) {
        if self.state.selected().is_some() {
            self.spawn_fetch(true);
        }
    }

    fn spawn_fetch(&mut self, bypass_cache: bool) {
        let Some(key) = self.state.selected().cloned() else {
            return;
        };
        self.cancel_fetch();
        self.state.begin_snapshot();

        let fetcher = self.snapshots.clone();
        let tx = self.snapshot_tx.clone();
        debug!(key = %key, bypass_cache, "fetching snapshot");
        self.fetch = Some(tokio::spawn(async move {
            let result = if bypass_cache {
                fetcher.refetch(&key).await
            } else {
                fetcher.fetch(&key).await
            };
            let _ = tx.send((key, result));
        }));
    }

    fn cancel_fetch(&mut self) {
        if let Some(task) = self.fetch.take() {
            task.abort();
        }
    }

    /// Waits until something changes the view and returns the new view.
    ///
    /// Cancel-safe: no update or snapshot result is lost if the future is dropped.
    pub async fn next_view(&mut self) -> ReconciledView {
        loop {
            let changed = tokio::select! {
                update = self.subscriptions.next_update() => self.state.apply_update(update),
                Some((key, result)) = self.snapshot_rx.recv() => {
                    self.state.apply_snapshot(&key, result)
                }
            };
            if changed {
                return self.state.view();
            }
        }
    }

    /// Stops monitoring: closes the channel, cancels any fetch, clears the selection.
    pub fn dispose(&mut self) {
        self.cancel_fetch();
        self.subscriptions.dispose();
        self.state.select(None);
    }
}

impl<T, S> Drop for MonitorSession<T, S> {
    fn drop(&mut self) {
        if let Some(task) = self.fetch.take() {
            task.abort();
        }
    }
}
