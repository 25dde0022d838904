//! In-process transport that lets callers script what each channel reports.

use super::{Channel, ChannelId, EventSink, SubscriptionKey, Transport, TransportEvent};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct OpenedChannel {
    id: ChannelId,
    key: SubscriptionKey,
    token: CancellationToken,
    sink: EventSink,
}

/// [`Transport`] that never touches the network.
///
/// Every opened channel is recorded. Events are injected with [`MemoryTransport::emit`],
/// and a channel reports [`TransportEvent::Opened`] as soon as it is opened.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    opened: Arc<Mutex<Vec<OpenedChannel>>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) -> MutexGuard<'_, Vec<OpenedChannel>> {
        self.opened.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of channels that are open right now.
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opened()
            .iter()
            .filter(|channel| !channel.token.is_cancelled())
            .count()
    }

    /// Number of channels ever opened.
    #[must_use]
    pub fn opened_total(&self) -> usize {
        self.opened().len()
    }

    /// Keys of every channel ever opened, in order.
    #[must_use]
    pub fn opened_keys(&self) -> Vec<SubscriptionKey> {
        self.opened().iter().map(|channel| channel.key.clone()).collect()
    }

    /// Whether the channel has been closed by its owner.
    #[must_use]
    pub fn is_closed(&self, id: ChannelId) -> bool {
        self.opened()
            .iter()
            .find(|channel| channel.id == id)
            .is_none_or(|channel| channel.token.is_cancelled())
    }

    /// Delivers `event` as if channel `id` produced it, even if it was already closed.
    ///
    /// Returns `false` if the channel is unknown or the consumer queue rejected it.
    pub fn emit(&self, id: ChannelId, event: TransportEvent) -> bool {
        self.opened()
            .iter()
            .find(|channel| channel.id == id)
            .is_some_and(|channel| channel.sink.try_send(event))
    }

    /// Delivers a text frame on channel `id`.
    pub fn emit_message(&self, id: ChannelId, payload: impl Into<String>) -> bool {
        self.emit(id, TransportEvent::Message(payload.into()))
    }

    /// Delivers a transport fault on channel `id`.
    pub fn emit_error(&self, id: ChannelId, payload: impl Into<String>) -> bool {
        self.emit(id, TransportEvent::Error(payload.into()))
    }
}

impl Transport for MemoryTransport {
    fn open(&self, key: &SubscriptionKey, sink: EventSink) -> Channel {
        let id = sink.channel();
        let token = CancellationToken::new();
        sink.try_send(TransportEvent::Opened);
        self.opened().push(OpenedChannel {
            id,
            key: key.clone(),
            token: token.clone(),
            sink,
        });
        Channel::new(id, key.clone(), token)
    }
}
