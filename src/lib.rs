//! # penwatch
//!
//! Client library for a livestock-pen telemetry service: an initial
//! snapshot over REST, then incremental updates over a persistent
//! WebSocket.
//!
//! The crate is organized around a resilient network access layer:
//!
//! - [`net::api::ApiClient`] — single request/response exchanges with
//!   per-attempt timeout, capped retry, exponential backoff, and a
//!   non-retryable 401 fast path.
//! - [`net::stream::StreamClient`] — one long-lived duplex connection with
//!   bounded exponential reconnection and a terminal state on credential
//!   rejection (close code 1008).
//! - [`validate`] — the trust boundary: permissive normalization of raw
//!   payloads into well-typed domain shapes, never failing on malformed
//!   input.
//! - [`session::SessionStore`] — process-wide holder of the credential
//!   token, backed by durable storage.
//! - [`series::SeriesWindow`] — consumer-side bounded window over live
//!   time-series points.
//!
//! Both network clients take their transport as an injected capability
//! ([`net::http::HttpTransport`], [`net::stream::Connector`]) so they can
//! be exercised against scripted transports and a paused clock.

pub mod error;
pub mod net;
pub mod series;
pub mod session;
pub mod types;
pub mod validate;

pub use error::{ApiError, StreamError};
pub use net::api::ApiClient;
pub use net::stream::{StreamClient, StreamHandlers, StreamMessage};
pub use session::SessionStore;
