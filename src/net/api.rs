//! REST request client: timeout, capped retry, exponential backoff, and a
//! non-retryable 401 fast path.
//!
//! DESIGN
//! ======
//! Each attempt runs under its own `tokio::time::timeout`; expiry cancels
//! the in-flight transport future by dropping it and counts as a
//! retryable failure. A 401 short-circuits to the caller on first
//! occurrence regardless of remaining budget — retrying a rejected
//! credential only delays the forced re-login. Caller cancellation is
//! future drop: dropping the `request` future aborts the in-flight
//! attempt and any pending backoff sleep.
//!
//! Endpoint wrappers decode per endpoint. `fetch_pens` is the one place
//! the snapshot validator runs on REST data; `login` and
//! `fetch_pen_detail` decode strict typed shapes.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;
use crate::net::http::{HttpTransport, RawRequest, RawResponse, RequestBody, ReqwestTransport};
use crate::types::{LoginResponse, PenDetail, PensSnapshot};
use crate::validate::normalize_snapshot;

const DEFAULT_RETRIES: u32 = 3;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFF_BASE_MS: u64 = 1000;

/// Per-request knobs. `retries` is the total attempt budget; zero is
/// treated as one, since a request that never runs is meaningless.
#[derive(Clone, Debug)]
pub struct RequestOptions {
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
    pub retries: u32,
    pub timeout: Duration,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            body: None,
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl RequestOptions {
    /// Default options plus a bearer-token `Authorization` header.
    #[must_use]
    pub fn bearer(token: &str) -> Self {
        Self {
            headers: vec![("Authorization".to_owned(), format!("Bearer {token}"))],
            ..Self::default()
        }
    }
}

/// Retrying REST client over an injected transport.
pub struct ApiClient<T = ReqwestTransport> {
    base_url: String,
    transport: T,
}

impl ApiClient {
    /// Client over the production reqwest transport.
    #[must_use]
    pub fn new(base_url: &str) -> Self {
        Self::with_transport(base_url, ReqwestTransport::new())
    }
}

impl<T: HttpTransport> ApiClient<T> {
    pub fn with_transport(base_url: &str, transport: T) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            transport,
        }
    }

    /// Issue one logical request, retrying retryable failures with
    /// exponential backoff (`1000 ms × 2^attempt_index`).
    ///
    /// # Errors
    ///
    /// [`ApiError::Unauthorized`] immediately on HTTP 401;
    /// [`ApiError::Decode`] on a 2xx body that does not match `R`;
    /// [`ApiError::Exhausted`] wrapping the last retryable failure once
    /// the budget is spent.
    pub async fn request<R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        opts: RequestOptions,
    ) -> Result<R, ApiError> {
        let attempts = opts.retries.max(1);
        let raw = RawRequest {
            method,
            url: format!("{}{path}", self.base_url),
            headers: opts.headers,
            body: opts.body,
        };

        let mut last_failure = None;
        for attempt in 0..attempts {
            match self.attempt(raw.clone(), opts.timeout).await {
                Ok(response) => return Ok(serde_json::from_str(&response.body)?),
                Err(error @ ApiError::Unauthorized) => return Err(error),
                Err(error) => {
                    tracing::debug!(%error, attempt, "request attempt failed");
                    if attempt + 1 < attempts {
                        let delay = BACKOFF_BASE_MS.saturating_mul(1_u64 << attempt.min(16));
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_failure = Some(error);
                }
            }
        }

        // attempts >= 1, so at least one failure was recorded.
        let source = last_failure.unwrap_or(ApiError::Timeout);
        Err(ApiError::Exhausted {
            attempts,
            source: Box::new(source),
        })
    }

    async fn attempt(
        &self,
        request: RawRequest,
        timeout: Duration,
    ) -> Result<RawResponse, ApiError> {
        let response = tokio::time::timeout(timeout, self.transport.execute(request))
            .await
            .map_err(|_| ApiError::Timeout)?
            .map_err(ApiError::Transport)?;

        if response.is_success() {
            Ok(response)
        } else if response.status == 401 {
            Err(ApiError::Unauthorized)
        } else {
            Err(ApiError::Status(response.status))
        }
    }

    /// `POST /auth/login` with form-encoded credentials.
    ///
    /// # Errors
    ///
    /// 401 here means the credentials themselves were rejected.
    pub async fn login(&self, username: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let opts = RequestOptions {
            body: Some(RequestBody::Form(vec![
                ("username".to_owned(), username.to_owned()),
                ("password".to_owned(), password.to_owned()),
            ])),
            ..RequestOptions::default()
        };
        self.request(Method::POST, "/auth/login", opts).await
    }

    /// `GET /pens`: the full snapshot, normalized at the trust boundary.
    ///
    /// # Errors
    ///
    /// Network-layer failures only; a malformed body still yields a
    /// well-typed (possibly empty) snapshot.
    pub async fn fetch_pens(&self, token: &str) -> Result<PensSnapshot, ApiError> {
        let raw: Value = self
            .request(Method::GET, "/pens", RequestOptions::bearer(token))
            .await?;
        Ok(normalize_snapshot(&raw))
    }

    /// `GET /pens/{id}/detail`: identity plus the recent series.
    ///
    /// # Errors
    ///
    /// As [`ApiClient::request`]; the detail shape is decoded strictly.
    pub async fn fetch_pen_detail(&self, token: &str, pen_id: i64) -> Result<PenDetail, ApiError> {
        let path = format!("/pens/{pen_id}/detail");
        self.request(Method::GET, &path, RequestOptions::bearer(token))
            .await
    }
}
