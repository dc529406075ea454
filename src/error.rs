//! Failure taxonomy for the network access layer.
//!
//! DESIGN
//! ======
//! Retryability is a property of the error, not of the call site:
//! [`ApiError::is_retryable`] is the single place that decides which REST
//! failures the request client may retry. `Unauthorized` is deliberately
//! not retryable — a rejected credential never heals by waiting, so it is
//! surfaced on the first occurrence for forced re-authentication.

/// Error returned by the REST request client.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The transport did not complete before the per-attempt deadline.
    #[error("request timed out")]
    Timeout,
    /// HTTP 401. Never retried; the stored credential must be discarded.
    #[error("unauthorized (HTTP 401)")]
    Unauthorized,
    /// Any non-success HTTP status other than 401.
    #[error("server returned HTTP {0}")]
    Status(u16),
    /// Connection-level failure before a status line was received.
    #[error("transport failed: {0}")]
    Transport(String),
    /// A 2xx body that does not decode as the expected shape.
    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),
    /// The retry budget is spent; wraps the last retryable failure.
    #[error("gave up after {attempts} attempts: {source}")]
    Exhausted {
        /// Total attempts made, including the first.
        attempts: u32,
        /// The failure observed on the final attempt.
        source: Box<ApiError>,
    },
}

impl ApiError {
    /// Whether the request client may spend retry budget on this failure.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::Status(_) | Self::Transport(_))
    }
}

/// Error surfaced by the live subscription channel.
///
/// Reconnection is handled internally by the stream state machine; callers
/// only ever see these through the optional `on_error` hook, plus
/// [`StreamError::AuthRejected`] through the dedicated auth-failure hook.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The WebSocket handshake failed.
    #[error("websocket connect failed: {0}")]
    Connect(String),
    /// The established socket failed mid-stream.
    #[error("websocket transport error: {0}")]
    Transport(String),
    /// The server closed the connection with code 1008. Terminal.
    #[error("subscription rejected by server (close code 1008)")]
    AuthRejected,
    /// The base URL is not an http(s) address.
    #[error("invalid stream url: {0}")]
    InvalidUrl(String),
}
