#![cfg_attr(not(test), forbid(unsafe_code))]
#![deny(warnings, clippy::pedantic)]
#![allow(clippy::multiple_crate_versions, clippy::module_name_repetitions)]

//! Core of the adpulse dashboard.
//!
//! A [`SubscriptionManager`](subscription::SubscriptionManager) keeps at most one live
//! [`Channel`](transport::Channel) open for the selected campaign, a
//! [`SnapshotFetcher`](snapshot::SnapshotFetcher) loads the campaign's last known
//! metrics, and [`reconcile`](reconcile::reconcile) merges both into the single
//! [`ReconciledView`](reconcile::ReconciledView) handed to presentation.
//! [`MonitorSession`](session::MonitorSession) drives all of it from one event loop.

pub mod api;
pub mod cache;
pub mod error;
pub mod overview;
pub mod reconcile;
pub mod session;
pub mod snapshot;
pub mod state;
pub mod subscription;
pub mod transport;

#[cfg(test)]
mod api_test;
#[cfg(test)]
mod subscription_test;

pub use error::{MonitorError, MonitorResult};
pub use reconcile::{ReconciledView, ViewSource};
pub use session::MonitorSession;
pub use subscription::{SubscriptionChange, SubscriptionManager, SubscriptionUpdate};
pub use transport::SubscriptionKey;
