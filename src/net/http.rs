//! Injected HTTP capability for the request client.
//!
//! The request client never touches a real socket directly; it hands a
//! [`RawRequest`] to an [`HttpTransport`] and gets back a status line and
//! body. Production uses [`ReqwestTransport`]; tests script the exchange.

use std::future::Future;

use reqwest::Method;

/// One request handed to the transport. Timeout enforcement happens in
/// the request client, not here.
#[derive(Clone, Debug)]
pub struct RawRequest {
    pub method: Method,
    pub url: String,
    /// Plain header pairs; invalid names or values fail the attempt as a
    /// transport error.
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// Request body variants this service actually uses.
#[derive(Clone, Debug)]
pub enum RequestBody {
    /// `application/x-www-form-urlencoded` pairs (login only).
    Form(Vec<(String, String)>),
}

/// Undecoded response: status plus the body text.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The transport seam. Errors are connection-level failures, reported as
/// display strings; HTTP error statuses come back as ordinary responses.
pub trait HttpTransport: Send + Sync {
    fn execute(
        &self,
        request: RawRequest,
    ) -> impl Future<Output = Result<RawResponse, String>> + Send;
}

impl<T: HttpTransport> HttpTransport for std::sync::Arc<T> {
    fn execute(
        &self,
        request: RawRequest,
    ) -> impl Future<Output = Result<RawResponse, String>> + Send {
        self.as_ref().execute(request)
    }
}

/// Production transport over a shared [`reqwest::Client`].
#[derive(Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: RawRequest) -> Result<RawResponse, String> {
        let mut builder = self.client.request(request.method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = match request.body {
            Some(RequestBody::Form(fields)) => builder.form(&fields),
            None => builder,
        };

        let response = builder.send().await.map_err(|error| error.to_string())?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|error| error.to_string())?;
        Ok(RawResponse { status, body })
    }
}
