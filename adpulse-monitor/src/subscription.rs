//! Single live subscription bound to a changeable key.
//!
//! [`SubscriptionManager`] owns at most one [`Channel`]. Selecting a new key closes the
//! current channel before the next one is opened, and every transport event carries the
//! id of the channel that produced it, so anything arriving from a channel that is no
//! longer current is dropped on receipt. Events are consumed from a single queue, one at
//! a time, which keeps handling strictly sequential regardless of how many tasks the
//! transport runs internally.

use crate::transport::{
    Channel, ChannelEvent, ChannelId, EventSink, SubscriptionKey, Transport, TransportEvent,
};
use metrics::counter;
use shared::{
    config::Config,
    models::{CampaignInsight, StreamError},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Outcome of [`SubscriptionManager::set_subscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionChange {
    /// The key is already subscribed and its channel is open; nothing happened.
    Unchanged,
    /// Any previous channel was closed and a new one opened.
    Subscribed,
    /// The previous channel was closed and nothing replaced it.
    Unsubscribed,
    /// There was nothing to close and nothing was requested.
    Idle,
}

/// What the current channel reported, after filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionUpdate {
    /// The transport established the connection.
    Connected {
        /// Subscribed key.
        key: SubscriptionKey,
    },
    /// A frame describing the subscribed entity.
    Metric {
        /// Subscribed key.
        key: SubscriptionKey,
        /// Decoded record.
        metric: CampaignInsight,
    },
    /// A classified failure.
    Error {
        /// Subscribed key.
        key: SubscriptionKey,
        /// What went wrong.
        error: StreamError,
        /// Whether the channel was closed because of it. Parse failures leave it open.
        channel_closed: bool,
    },
}

impl SubscriptionUpdate {
    /// Key the update belongs to.
    #[must_use]
    pub const fn key(&self) -> &SubscriptionKey {
        match self {
            Self::Connected { key } | Self::Metric { key, .. } | Self::Error { key, .. } => key,
        }
    }
}

/// Owns the lifecycle of the one live channel.
#[derive(Debug)]
pub struct SubscriptionManager<T> {
    transport: T,
    sender: mpsc::Sender<ChannelEvent>,
    events: mpsc::Receiver<ChannelEvent>,
    current: Option<Channel>,
    next_channel: u64,
}

impl<T: Transport> SubscriptionManager<T> {
    /// Creates a manager whose event queue holds up to `buffer` undelivered events.
    pub fn new(transport: T, buffer: usize) -> Self {
        let (sender, events) = mpsc::channel(buffer.max(1));
        Self {
            transport,
            sender,
            events,
            current: None,
            next_channel: 1,
        }
    }

    /// Creates a manager sized by `stream.event_buffer`.
    pub fn from_config(transport: T, config: &Config) -> Self {
        Self::new(transport, config.stream.event_buffer)
    }

    /// The transport channels are opened with.
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Key of the current channel, open or closed by an error.
    pub fn current_key(&self) -> Option<&SubscriptionKey> {
        self.current.as_ref().map(Channel::key)
    }

    /// Id of the current channel.
    pub fn current_channel(&self) -> Option<ChannelId> {
        self.current.as_ref().map(Channel::id)
    }

    /// Whether a channel is currently open.
    pub fn is_open(&self) -> bool {
        self.current.as_ref().is_some_and(Channel::is_open)
    }

    /// Points the subscription at `key`, or at nothing.
    ///
    /// Re-selecting the key whose channel is still open is a no-op. Otherwise the current
    /// channel, if any, is closed first and a fresh one is opened for `key`. Calling
    /// this again with the key of a channel that failed re-opens it.
    pub fn set_subscription(&mut self, key: Option<SubscriptionKey>) -> SubscriptionChange {
        if let (Some(requested), Some(current)) = (&key, &self.current)
            && current.is_open()
            && current.key() == requested
        {
            debug!(key = %requested, "subscription unchanged");
            return SubscriptionChange::Unchanged;
        }

        let had_channel = self.teardown();

        let Some(key) = key else {
            return if had_channel {
                info!("unsubscribed");
                SubscriptionChange::Unsubscribed
            } else {
                SubscriptionChange::Idle
            };
        };

        let id = ChannelId(self.next_channel);
        self.next_channel += 1;
        let channel = self
            .transport
            .open(&key, EventSink::new(id, self.sender.clone()));
        info!(key = %key, channel = %channel.id(), "subscribed");
        self.current = Some(channel);
        SubscriptionChange::Subscribed
    }

    /// Closes and forgets the current channel. Returns whether there was one.
    fn teardown(&mut self) -> bool {
        match self.current.take() {
            Some(mut channel) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Tears the subscription down through the same path as a key change.
    pub fn dispose(&mut self) {
        self.set_subscription(None);
    }

    /// Filters and classifies one transport event.
    ///
    /// Returns `None` for anything that must not reach the consumer: events from a
    /// channel that is not current or already closed, and frames describing a different
    /// entity than the subscribed key.
    pub fn handle_event(&mut self, event: ChannelEvent) -> Option<SubscriptionUpdate> {
        let Some(current) = self
            .current
            .as_mut()
            .filter(|channel| channel.id() == event.channel && channel.is_open())
        else {
            counter!("adpulse_stream_frames_discarded_total").increment(1);
            debug!(channel = %event.channel, "dropping event from inactive channel");
            return None;
        };
        let key = current.key().clone();

        match event.event {
            TransportEvent::Opened => Some(SubscriptionUpdate::Connected { key }),
            TransportEvent::Message(raw) => match serde_json::from_str::<CampaignInsight>(&raw) {
                Ok(metric) if metric.describes(key.as_str()) => {
                    Some(SubscriptionUpdate::Metric { key, metric })
                }
                Ok(metric) => {
                    counter!("adpulse_stream_frames_discarded_total").increment(1);
                    warn!(
                        key = %key,
                        payload_campaign = metric.campaign_id.as_deref().unwrap_or("<none>"),
                        "ignoring frame for a different campaign"
                    );
                    None
                }
                Err(err) => {
                    counter!("adpulse_stream_errors_total").increment(1);
                    warn!(key = %key, error = %err, "undecodable frame");
                    Some(SubscriptionUpdate::Error {
                        key,
                        error: StreamError::parse_failure(raw),
                        channel_closed: false,
                    })
                }
            },
            TransportEvent::Error(raw) => {
                let error = StreamError::classify(&raw);
                current.close();
                counter!("adpulse_stream_errors_total").increment(1);
                warn!(key = %key, status = ?error.status, message = %error.message, "stream failed");
                Some(SubscriptionUpdate::Error {
                    key,
                    error,
                    channel_closed: true,
                })
            }
        }
    }

    /// Waits for the next update from the current channel.
    ///
    /// Cancel-safe: dropping the future before it completes loses no event.
    pub async fn next_update(&mut self) -> SubscriptionUpdate {
        loop {
            let Some(event) = self.events.recv().await else {
                // The manager holds a sender, so the queue never closes.
                return std::future::pending().await;
            };
            if let Some(update) = self.handle_event(event) {
                return update;
            }
        }
    }

    /// Returns the next update if one is already queued.
    pub fn try_next_update(&mut self) -> Option<SubscriptionUpdate> {
        while let Ok(event) = self.events.try_recv() {
            if let Some(update) = self.handle_event(event) {
                return Some(update);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    #[test]
    fn same_key_is_a_noop_while_open() {
        let mut manager = SubscriptionManager::new(MemoryTransport::new(), 8);
        assert_eq!(
            manager.set_subscription(Some("c1".into())),
            SubscriptionChange::Subscribed
        );
        assert_eq!(
            manager.set_subscription(Some("c1".into())),
            SubscriptionChange::Unchanged
        );
        assert_eq!(manager.transport().opened_total(), 1);
    }

    #[test]
    fn null_key_without_channel_is_idle() {
        let mut manager = SubscriptionManager::new(MemoryTransport::new(), 8);
        assert_eq!(manager.set_subscription(None), SubscriptionChange::Idle);
        assert_eq!(manager.current_key(), None);
        assert!(!manager.is_open());
    }

    #[test]
    fn update_exposes_key() {
        let update = SubscriptionUpdate::Connected { key: "c9".into() };
        assert_eq!(update.key().as_str(), "c9");
    }
}
