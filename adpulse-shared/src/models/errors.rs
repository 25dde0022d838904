use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Message attached to a frame that could not be decoded.
pub const PARSE_FAILURE_MESSAGE: &str = "Failed to parse SSE payload";

/// Message used when a transport fault carries no structured description.
pub const CONNECTION_ERROR_MESSAGE: &str = "SSE connection error";

/// Fallback message for a failed one-shot request with no usable description.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// Normalised failure of a one-shot REST read.
///
/// Every non-2xx response and every transport failure is folded into this
/// `{ message, status }` pair. `status` is `0` when no HTTP response was received.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message} (status {status})")]
pub struct ApiError {
    /// Human readable description.
    pub message: String,
    /// HTTP status code, or `0` for transport failures.
    pub status: u16,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    /// Builds an error from a non-2xx response body.
    ///
    /// The message is taken from the body's `message` field, then its `error`
    /// field, then `fallback`, and finally [`UNKNOWN_ERROR_MESSAGE`].
    #[must_use]
    pub fn from_response_body(status: u16, body: &str, fallback: Option<&str>) -> Self {
        let parsed = serde_json::from_str::<Value>(body).ok();
        let from_body = parsed.as_ref().and_then(Value::as_object).and_then(|map| {
            text_field(map, "message").or_else(|| text_field(map, "error"))
        });

        let message = from_body
            .or_else(|| fallback.filter(|text| !text.is_empty()).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());

        Self { message, status }
    }

    /// Whether the failure happened before any HTTP response arrived.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        self.status == 0
    }
}

/// Classified failure of the live metric stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{message}")]
pub struct StreamError {
    /// Status code reported by the server, when one was available.
    pub status: Option<u16>,
    /// Human readable description.
    pub message: String,
    /// Origin timestamp reported alongside the error.
    pub timestamp: Option<String>,
    /// Raw payload kept for diagnostics.
    pub raw: Option<String>,
}

impl StreamError {
    /// A frame arrived on an open channel but could not be decoded.
    pub fn parse_failure(raw: impl Into<String>) -> Self {
        Self {
            status: None,
            message: PARSE_FAILURE_MESSAGE.to_string(),
            timestamp: None,
            raw: non_empty(raw.into()),
        }
    }

    /// A transport fault with no structured description.
    pub fn connection(raw: impl Into<String>) -> Self {
        Self {
            status: None,
            message: CONNECTION_ERROR_MESSAGE.to_string(),
            timestamp: None,
            raw: non_empty(raw.into()),
        }
    }

    /// Classifies a raw transport error payload.
    ///
    /// JSON objects contribute `status`, `message` (or `error`) and `timestamp`.
    /// Anything else, or an object carrying neither a status nor a message,
    /// becomes a generic [`StreamError::connection`].
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(raw) else {
            return Self::connection(raw);
        };

        let status = map.get("status").and_then(status_from_value);
        let message = text_field(&map, "message").or_else(|| text_field(&map, "error"));
        if status.is_none() && message.is_none() {
            return Self::connection(raw);
        }

        Self {
            status,
            message: message.unwrap_or_else(|| CONNECTION_ERROR_MESSAGE.to_string()),
            timestamp: map.get("timestamp").and_then(timestamp_from_value),
            raw: non_empty(raw.to_string()),
        }
    }

    /// Whether this error came from an undecodable frame rather than the transport.
    #[must_use]
    pub fn is_parse_failure(&self) -> bool {
        self.message == PARSE_FAILURE_MESSAGE
    }
}

impl From<&ApiError> for StreamError {
    fn from(err: &ApiError) -> Self {
        Self {
            status: (err.status != 0).then_some(err.status),
            message: err.message.clone(),
            timestamp: None,
            raw: None,
        }
    }
}

fn text_field(map: &Map<String, Value>, field: &str) -> Option<String> {
    map.get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

fn status_from_value(value: &Value) -> Option<u16> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u16::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn timestamp_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn non_empty(raw: String) -> Option<String> {
    if raw.is_empty() { None } else { Some(raw) }
}
