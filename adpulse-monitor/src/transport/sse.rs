//! Server-sent events transport.
//!
//! Each channel is one `GET {base}/campaigns/{id}/insights/stream` request whose body is
//! decoded incrementally as `text/event-stream`. The stream endpoint is unauthenticated,
//! so unlike [`CampaignsClient`](crate::api::CampaignsClient) no bearer token is sent.

use super::{Channel, ChannelId, EventSink, SubscriptionKey, Transport, TransportEvent};
use crate::{
    api::stream_url,
    error::{MonitorError, MonitorResult},
};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode, header::ACCEPT};
use serde_json::{Value, json};
use shared::config::Config;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Payload reported when the server ends the stream on its own.
pub const STREAM_CLOSED_MESSAGE: &str = "stream closed by server";

/// Longest line [`SseDecoder`] buffers before dropping it.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// [`Transport`] backed by HTTP server-sent events.
#[derive(Debug, Clone)]
pub struct SseTransport {
    client: Client,
    base_url: Url,
}

impl SseTransport {
    /// Creates a transport that resolves stream URLs against `base_url`.
    #[must_use]
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Builds a transport from loaded configuration.
    ///
    /// Streams are long-lived, so only the connect phase is bounded by the request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> MonitorResult<Self> {
        let client = Client::builder()
            .connect_timeout(config.request_timeout())
            .build()
            .map_err(MonitorError::Client)?;
        Ok(Self::new(client, config.api.base_url.clone()))
    }
}

impl Transport for SseTransport {
    fn open(&self, key: &SubscriptionKey, sink: EventSink) -> Channel {
        let id = sink.channel();
        let token = CancellationToken::new();
        let channel = Channel::new(id, key.clone(), token.clone());

        let url = match stream_url(&self.base_url, key) {
            Ok(url) => url,
            Err(err) => {
                warn!(channel = %id, key = %key, error = %err, "cannot build stream URL");
                sink.try_send(TransportEvent::Error(err.to_string()));
                return channel;
            }
        };

        info!(channel = %id, key = %key, url = %url, "opening event stream");
        let client = self.client.clone();
        let task = tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => debug!(channel = %id, "event stream cancelled"),
                () = pump(client, url, id, sink) => {}
            }
        });

        channel.with_task(task)
    }
}

async fn pump(client: Client, url: Url, id: ChannelId, sink: EventSink) {
    let response = match client
        .get(url)
        .header(ACCEPT, "text/event-stream")
        .send()
        .await
    {
        Ok(response) => response,
        Err(err) => {
            warn!(channel = %id, error = %err, "event stream connection failed");
            sink.send(TransportEvent::Error(err.to_string())).await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(channel = %id, status = status.as_u16(), "event stream rejected");
        sink.send(TransportEvent::Error(rejection_payload(status, &body)))
            .await;
        return;
    }

    if !sink.send(TransportEvent::Opened).await {
        return;
    }
    debug!(channel = %id, "event stream connected");

    let mut decoder = SseDecoder::default();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let bytes = match chunk {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(channel = %id, error = %err, "event stream chunk error");
                sink.send(TransportEvent::Error(err.to_string())).await;
                return;
            }
        };

        for frame in decoder.push(&bytes) {
            let event = match frame.event.as_deref() {
                None | Some("message") => TransportEvent::Message(frame.data),
                Some("error") => TransportEvent::Error(frame.data),
                Some(other) => {
                    debug!(channel = %id, event = other, "ignoring named event");
                    continue;
                }
            };
            if !sink.send(event).await {
                return;
            }
        }
    }

    debug!(channel = %id, "event stream ended");
    sink.send(TransportEvent::Error(STREAM_CLOSED_MESSAGE.to_string()))
        .await;
}

/// Turns a non-2xx stream response into an error payload carrying the status.
fn rejection_payload(status: StatusCode, body: &str) -> String {
    let mut payload = match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => {
            let message = status.canonical_reason().unwrap_or("stream request rejected");
            return json!({ "status": status.as_u16(), "message": message }).to_string();
        }
    };
    payload
        .entry("status")
        .or_insert_with(|| Value::from(status.as_u16()));
    Value::Object(payload).to_string()
}

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the last `event:` field, if any.
    pub event: Option<String>,
    /// `data:` lines joined with `\n`.
    pub data: String,
    /// Value of the last `id:` field, if any.
    pub id: Option<String>,
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes may arrive split anywhere, including inside a UTF-8 sequence, so input is
/// buffered until a full line is available. A line longer than [`MAX_LINE_BYTES`] is
/// dropped together with the event it belonged to.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Bytes of `buffer` already known to hold no newline.
    scanned: usize,
    /// Skipping the remainder of an oversized line.
    discarding: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
}

impl SseDecoder {
    /// Feeds a chunk and returns every event completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);
        let buffer = std::mem::take(&mut self.buffer);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = buffer[self.scanned..].iter().position(|byte| *byte == b'\n') {
            let end = self.scanned + offset;
            let line = &buffer[start..end];
            start = end + 1;
            self.scanned = start;
            if std::mem::take(&mut self.discarding) {
                continue;
            }
            let line = String::from_utf8_lossy(line);
            let line = line.strip_suffix('\r').unwrap_or(&line);
            if let Some(frame) = self.feed_line(line) {
                frames.push(frame);
            }
        }

        self.buffer = buffer;
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        if self.buffer.len() > MAX_LINE_BYTES {
            warn!(bytes = self.buffer.len(), "dropping oversized event stream line");
            self.reset();
            self.discarding = true;
        }
        frames
    }

    fn reset(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.event = None;
        self.data.clear();
        self.id = None;
    }

    fn feed_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        let id = self.id.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseFrame { event, data, id })
    }
}
