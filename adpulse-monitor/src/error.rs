//! # Monitor Error Types

use shared::models::ApiError;
use thiserror::Error;

/// Result type alias for monitor operations
pub type MonitorResult<T> = Result<T, MonitorError>;

/// Errors raised while setting up or talking to the campaign backend.
#[derive(Error, Debug)]
pub enum MonitorError {
    /// A one-shot request failed; carries the normalised `{message, status}` pair.
    #[error("request failed: {0}")]
    Http(#[from] ApiError),

    /// The configured base URL cannot have endpoint paths appended to it.
    #[error("invalid base URL {url}: {reason}")]
    InvalidUrl {
        /// Offending URL.
        url: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl MonitorError {
    /// Create a new invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Status code of the failed request, if the error came from the backend.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http(err) if err.status != 0 => Some(err.status),
            _ => None,
        }
    }
}
