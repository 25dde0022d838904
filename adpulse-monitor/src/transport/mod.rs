//! Transport adapter contract.
//!
//! A [`Transport`] opens one server-to-client event stream per [`Channel`]. Opening
//! never blocks: the connection is established in the background and everything it
//! observes is reported later as [`ChannelEvent`]s pushed into the [`EventSink`] the
//! channel was opened with. Every event is stamped with the [`ChannelId`] of the
//! channel that produced it, so a consumer can tell a live channel's events from the
//! leftovers of one it already closed.

pub mod memory;
pub mod sse;


use metrics::counter;
use serde::{Deserialize, Serialize};
use std::{borrow::Borrow, fmt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub use memory::MemoryTransport;
pub use sse::SseTransport;

/// Identifier of the entity being live-monitored (a campaign id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Wraps a campaign id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SubscriptionKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for SubscriptionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for SubscriptionKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Identity of one opened channel; never reused within a manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch-{}", self.0)
    }
}

/// Notification produced by a transport for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The connection was established.
    Opened,
    /// One inbound frame, as opaque text.
    Message(String),
    /// A connection fault. The payload is whatever the transport could observe:
    /// a server-sent error body, or a description of the network failure.
    Error(String),
}

/// A [`TransportEvent`] tagged with the channel that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Producing channel.
    pub channel: ChannelId,
    /// What happened.
    pub event: TransportEvent,
}

/// Sending half handed to a transport when a channel is opened.
#[derive(Debug, Clone)]
pub struct EventSink {
    channel: ChannelId,
    sender: mpsc::Sender<ChannelEvent>,
}

impl EventSink {
    /// Creates a sink that stamps every event with `channel`.
    #[must_use]
    pub fn new(channel: ChannelId, sender: mpsc::Sender<ChannelEvent>) -> Self {
        Self { channel, sender }
    }

    /// Channel this sink reports for.
    #[must_use]
    pub const fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Queues an event, waiting for room. Returns `false` once the consumer is gone.
    pub async fn send(&self, event: TransportEvent) -> bool {
        self.sender
            .send(ChannelEvent {
                channel: self.channel,
                event,
            })
            .await
            .is_ok()
    }

    /// Queues an event without waiting. Returns `false` if the queue is full or closed.
    pub fn try_send(&self, event: TransportEvent) -> bool {
        self.sender
            .try_send(ChannelEvent {
                channel: self.channel,
                event,
            })
            .is_ok()
    }
}

/// One live streaming connection bound to a [`SubscriptionKey`].
///
/// Dropping a channel closes it. Closing cancels the channel's token and aborts its
/// background task, which releases the underlying connection.
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    key: SubscriptionKey,
    token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl Channel {
    /// Creates an open channel whose lifetime is tied to `token`.
    #[must_use]
    pub fn new(id: ChannelId, key: SubscriptionKey, token: CancellationToken) -> Self {
        counter!("adpulse_channels_opened_total").increment(1);
        Self {
            id,
            key,
            token,
            task: None,
        }
    }

    /// Attaches the task driving the connection; it is aborted on close.
    #[must_use]
    pub fn with_task(mut self, task: JoinHandle<()>) -> Self {
        self.task = Some(task);
        self
    }

    /// Channel identity.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Key the channel is bound to.
    #[must_use]
    pub const fn key(&self) -> &SubscriptionKey {
        &self.key
    }

    /// Whether [`Channel::close`] has not been called yet.
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.token.is_cancelled()
    }

    /// Closes the channel. Safe to call any number of times.
    pub fn close(&mut self) {
        if !self.token.is_cancelled() {
            self.token.cancel();
            counter!("adpulse_channels_closed_total").increment(1);
            debug!(channel = %self.id, key = %self.key, "channel closed");
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens streaming connections.
pub trait Transport: Send + Sync {
    /// Starts a stream bound to `key` and returns its channel immediately.
    ///
    /// Connection progress, frames and faults are reported through `sink`.
    /// The returned channel must carry `sink.channel()` as its id.
    fn open(&self, key: &SubscriptionKey, sink: EventSink) -> Channel;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_is_idempotent() {
        let token = CancellationToken::new();
        let mut channel = Channel::new(ChannelId(1), "c1".into(), token.clone());
        assert!(channel.is_open());

        channel.close();
        channel.close();
        assert!(!channel.is_open());
        assert!(token.is_cancelled());
    }

    #[test]
    fn drop_closes_channel() {
        let token = CancellationToken::new();
        {
            let _channel = Channel::new(ChannelId(7), "c7".into(), token.clone());
            assert!(!token.is_cancelled());
        }
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn sink_stamps_channel_id() {
        let (tx, mut rx) = mpsc::channel(4);
        let sink = EventSink::new(ChannelId(3), tx);
        assert!(sink.send(TransportEvent::Opened).await);
        assert!(sink.try_send(TransportEvent::Message("{}".into())));

        assert_eq!(
            rx.recv().await,
            Some(ChannelEvent {
                channel: ChannelId(3),
                event: TransportEvent::Opened
            })
        );
        assert_eq!(rx.recv().await.unwrap().event, TransportEvent::Message("{}".into()));

        drop(rx);
        assert!(!sink.send(TransportEvent::Opened).await);
    }

    #[test]
    fn key_display_and_borrow() {
        let key = SubscriptionKey::new("camp-42");
        assert_eq!(key.to_string(), "camp-42");
        let borrowed: &str = key.borrow();
        assert_eq!(borrowed, "camp-42");
    }
}
