use std::time::Duration;
use thiserror::Error;

/// Boxed error type used for transport sources
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error code substituted when an error body is not valid JSON
pub const PARSE_ERROR_CODE: &str = "ParseError";

/// Message substituted when an error body carries no message
const NO_MESSAGE: &str = "No message was provided";

/// Sub-kind of an error reported by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Credentials rejected or quota exhausted (401, 429)
    Account,
    /// Request rejected by the service (other 4xx)
    Client,
    /// Service failure (5xx)
    Server,
    /// Any other non-2xx status
    Other,
}

impl RemoteErrorKind {
    /// Classify an HTTP status code
    #[must_use]
    pub const fn from_status(status: u16) -> Self {
        match status {
            401 | 429 => Self::Account,
            400..=499 => Self::Client,
            500..=599 => Self::Server,
            _ => Self::Other,
        }
    }
}

/// Coarse error classification, independent of the concrete variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The exchange could not be completed (socket, timeout, cancellation)
    Connection,
    /// Local misconfiguration or invalid input; never retried
    Client,
    /// The remote service answered with a non-2xx status
    Remote(RemoteErrorKind),
}

/// Error detail decoded from a non-2xx response body
///
/// The shrink service answers with `{"error": "<code>", "message": "<text>"}`.
/// Bodies shaped as `{"error": {"type": "<code>", "message": "<text>"}}` are
/// accepted as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorDetail {
    pub message: String,
    pub error: String,
}

impl ErrorDetail {
    /// Decode an error body, substituting a `ParseError` detail when the
    /// body is not a JSON object.
    #[must_use]
    pub fn from_body(body: &[u8]) -> Self {
        let value: serde_json::Value = match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) if value.is_object() => value,
            Ok(_) => return Self::parse_error("expected a JSON object"),
            Err(e) => return Self::parse_error(e),
        };

        let nested = value.get("error").filter(|v| v.is_object());
        let message = value
            .get("message")
            .or_else(|| nested.and_then(|e| e.get("message")))
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        let error = value
            .get("error")
            .and_then(serde_json::Value::as_str)
            .or_else(|| {
                nested
                    .and_then(|e| e.get("type"))
                    .and_then(serde_json::Value::as_str)
            })
            .unwrap_or_default();

        Self {
            message: message.to_owned(),
            error: error.to_owned(),
        }
    }

    fn parse_error(reason: impl std::fmt::Display) -> Self {
        Self {
            message: format!("Error while parsing response: {reason}"),
            error: PARSE_ERROR_CODE.to_owned(),
        }
    }
}

/// Transport error types
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpError {
    /// Request building failed
    #[error("Failed to build request: {0}")]
    RequestBuild(#[from] http::Error),

    /// Invalid header value
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(#[from] http::header::InvalidHeaderValue),

    /// Single request attempt timed out
    #[error("Error while connecting: request attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Caller-supplied deadline exceeded (including all retries)
    #[error("Error while connecting: operation deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Caller cancelled the request
    #[error("Error while connecting: request cancelled")]
    Cancelled,

    /// Transport error (network, connection, etc)
    #[error("Error while connecting: {0}")]
    Transport(#[source] BoxError),

    /// TLS configuration error
    #[error("TLS error: {0}")]
    Tls(#[source] BoxError),

    /// Response body exceeded size limit
    #[error("Response body too large: limit {limit} bytes, got {actual} bytes")]
    BodyTooLarge { limit: usize, actual: usize },

    /// JSON encoding error
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL (failed to parse)
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUri { url: String, reason: String },

    /// Invalid URL scheme for transport security configuration
    #[error("URL scheme '{scheme}' not allowed: {reason}")]
    InvalidScheme { scheme: String, reason: String },

    /// Every attempt ended without a response to report
    #[error("The client did not fulfill any requests")]
    NoResponse,

    /// Non-2xx response from the remote service
    #[error("{message} (HTTP {status}/{code})")]
    Remote {
        kind: RemoteErrorKind,
        message: String,
        code: String,
        status: u16,
    },
}

impl HttpError {
    /// Build a remote error from a status code and decoded error body
    #[must_use]
    pub fn remote(status: u16, detail: ErrorDetail) -> Self {
        let message = if detail.message.is_empty() {
            NO_MESSAGE.to_owned()
        } else {
            detail.message
        };
        HttpError::Remote {
            kind: RemoteErrorKind::from_status(status),
            message,
            code: detail.error,
            status,
        }
    }

    /// Coarse classification of this error
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            HttpError::Timeout(_)
            | HttpError::DeadlineExceeded(_)
            | HttpError::Cancelled
            | HttpError::Transport(_) => ErrorClass::Connection,
            HttpError::Remote { kind, .. } => ErrorClass::Remote(*kind),
            HttpError::RequestBuild(_)
            | HttpError::InvalidHeaderValue(_)
            | HttpError::Tls(_)
            | HttpError::BodyTooLarge { .. }
            | HttpError::Json(_)
            | HttpError::InvalidUri { .. }
            | HttpError::InvalidScheme { .. }
            | HttpError::NoResponse => ErrorClass::Client,
        }
    }

    /// HTTP status carried by a remote error
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<hyper::Error> for HttpError {
    fn from(err: hyper::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}

impl From<hyper_util::client::legacy::Error> for HttpError {
    fn from(err: hyper_util::client::legacy::Error) -> Self {
        HttpError::Transport(Box::new(err))
    }
}
