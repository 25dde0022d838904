//! Lifecycle tests for [`SubscriptionManager`] driven through [`MemoryTransport`].

use crate::{
    subscription::{SubscriptionChange, SubscriptionManager, SubscriptionUpdate},
    transport::{MemoryTransport, SubscriptionKey, TransportEvent},
};
use serde_json::json;
use shared::models::{CONNECTION_ERROR_MESSAGE, PARSE_FAILURE_MESSAGE};
use std::time::Duration;
use tokio::time::timeout;

fn manager() -> SubscriptionManager<MemoryTransport> {
    SubscriptionManager::new(MemoryTransport::new(), 32)
}

fn frame(campaign: &str, impressions: u64) -> String {
    json!({ "campaign_id": campaign, "impressions": impressions }).to_string()
}

async fn next(manager: &mut SubscriptionManager<MemoryTransport>) -> SubscriptionUpdate {
    timeout(Duration::from_secs(1), manager.next_update())
        .await
        .expect("no update within a second")
}

#[tokio::test]
async fn never_more_than_one_open_channel() {
    let mut manager = manager();
    let sequence = [
        Some("c1"),
        Some("c2"),
        Some("c2"),
        None,
        Some("c3"),
        Some("c1"),
        None,
        None,
        Some("c4"),
    ];

    for key in sequence {
        manager.set_subscription(key.map(SubscriptionKey::from));
        assert!(manager.transport().open_count() <= 1);
        assert_eq!(manager.is_open(), key.is_some());
    }
    assert_eq!(manager.transport().opened_total(), 5);
}

#[tokio::test]
async fn switching_keys_closes_before_opening() {
    let mut manager = manager();
    manager.set_subscription(Some("a".into()));
    let first = manager.current_channel().unwrap();

    manager.set_subscription(Some("b".into()));
    let second = manager.current_channel().unwrap();

    assert_ne!(first, second);
    assert!(manager.transport().is_closed(first));
    assert!(!manager.transport().is_closed(second));
    assert_eq!(
        manager.transport().opened_keys(),
        vec![SubscriptionKey::from("a"), SubscriptionKey::from("b")]
    );
}

#[tokio::test]
async fn late_frames_from_previous_key_are_discarded() {
    let mut manager = manager();
    manager.set_subscription(Some("a".into()));
    let old = manager.current_channel().unwrap();
    manager.set_subscription(Some("b".into()));
    let new = manager.current_channel().unwrap();

    // In-flight frame from the closed channel lands after the switch.
    assert!(manager.transport().emit_message(old, frame("a", 500)));
    assert!(manager.transport().emit_error(old, "boom"));
    assert!(manager.transport().emit_message(new, frame("b", 7)));

    assert_eq!(
        next(&mut manager).await,
        SubscriptionUpdate::Connected { key: "b".into() }
    );
    let SubscriptionUpdate::Metric { key, metric } = next(&mut manager).await else {
        panic!("expected metric for b");
    };
    assert_eq!(key.as_str(), "b");
    assert_eq!(metric.impressions, Some(7.0));
    assert!(manager.try_next_update().is_none());
}

#[tokio::test]
async fn mismatched_campaign_id_is_ignored() {
    let mut manager = manager();
    manager.set_subscription(Some("c1".into()));
    let channel = manager.current_channel().unwrap();

    manager.transport().emit_message(channel, frame("c2", 999));
    manager
        .transport()
        .emit_message(channel, json!({ "impressions": 5 }).to_string());
    manager.transport().emit_message(channel, frame("c1", 150));

    assert!(matches!(
        next(&mut manager).await,
        SubscriptionUpdate::Connected { .. }
    ));
    let SubscriptionUpdate::Metric { metric, .. } = next(&mut manager).await else {
        panic!("expected c1 metric");
    };
    assert_eq!(metric.campaign_id.as_deref(), Some("c1"));
    assert_eq!(metric.impressions, Some(150.0));
    assert!(manager.is_open());
}

#[tokio::test]
async fn malformed_frame_reports_error_and_keeps_channel_open() {
    let mut manager = manager();
    manager.set_subscription(Some("c1".into()));
    let channel = manager.current_channel().unwrap();
    next(&mut manager).await;

    manager.transport().emit_message(channel, "not json {");
    let SubscriptionUpdate::Error {
        error,
        channel_closed,
        ..
    } = next(&mut manager).await
    else {
        panic!("expected parse error");
    };
    assert_eq!(error.message, PARSE_FAILURE_MESSAGE);
    assert_eq!(error.raw.as_deref(), Some("not json {"));
    assert!(!channel_closed);
    assert!(manager.is_open());

    manager.transport().emit_message(channel, frame("c1", 3));
    assert!(matches!(
        next(&mut manager).await,
        SubscriptionUpdate::Metric { .. }
    ));
}

#[tokio::test]
async fn transport_error_closes_channel_and_same_key_reopens() {
    let mut manager = manager();
    manager.set_subscription(Some("c1".into()));
    let failed = manager.current_channel().unwrap();
    next(&mut manager).await;

    manager.transport().emit_error(
        failed,
        json!({ "status": 503, "message": "upstream down", "timestamp": "2024-05-01T10:00:00Z" })
            .to_string(),
    );
    let SubscriptionUpdate::Error {
        error,
        channel_closed,
        ..
    } = next(&mut manager).await
    else {
        panic!("expected transport error");
    };
    assert!(channel_closed);
    assert_eq!(error.status, Some(503));
    assert_eq!(error.message, "upstream down");
    assert_eq!(error.timestamp.as_deref(), Some("2024-05-01T10:00:00Z"));
    assert!(!manager.is_open());
    assert_eq!(manager.transport().open_count(), 0);
    assert_eq!(manager.current_key().map(SubscriptionKey::as_str), Some("c1"));

    // Frames racing the close are dropped.
    manager.transport().emit_message(failed, frame("c1", 1));
    assert!(manager.try_next_update().is_none());

    assert_eq!(
        manager.set_subscription(Some("c1".into())),
        SubscriptionChange::Subscribed
    );
    let reopened = manager.current_channel().unwrap();
    assert_ne!(reopened, failed);
    assert!(manager.is_open());
    assert_eq!(manager.transport().opened_total(), 2);
}

#[tokio::test]
async fn unstructured_transport_error_gets_generic_message() {
    let mut manager = manager();
    manager.set_subscription(Some("c1".into()));
    let channel = manager.current_channel().unwrap();
    next(&mut manager).await;

    manager.transport().emit_error(channel, "connection reset by peer");
    let SubscriptionUpdate::Error { error, .. } = next(&mut manager).await else {
        panic!("expected error");
    };
    assert_eq!(error.message, CONNECTION_ERROR_MESSAGE);
    assert_eq!(error.status, None);
    assert_eq!(error.raw.as_deref(), Some("connection reset by peer"));
}

#[tokio::test]
async fn unsubscribe_and_dispose_close_everything() {
    let mut manager = manager();
    manager.set_subscription(Some("c1".into()));
    assert_eq!(
        manager.set_subscription(None),
        SubscriptionChange::Unsubscribed
    );
    assert_eq!(manager.transport().open_count(), 0);
    assert_eq!(manager.current_key(), None);

    manager.set_subscription(Some("c2".into()));
    let transport = manager.transport().clone();
    manager.dispose();
    assert_eq!(transport.open_count(), 0);

    manager.set_subscription(Some("c3".into()));
    drop(manager);
    assert_eq!(transport.open_count(), 0);
    assert_eq!(transport.opened_total(), 3);
}

#[tokio::test]
async fn events_after_unsubscribe_are_dropped() {
    let mut manager = manager();
    manager.set_subscription(Some("c1".into()));
    let channel = manager.current_channel().unwrap();
    manager.set_subscription(None);

    manager.transport().emit(channel, TransportEvent::Message(frame("c1", 1)));
    assert!(manager.try_next_update().is_none());
}
