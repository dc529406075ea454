//! Live subscription client: one duplex connection with bounded,
//! exponentially backed-off reconnection.
//!
//! DESIGN
//! ======
//! One spawned task owns the whole connection lifecycle, so teardown is a
//! single `abort()`: it cancels a pending backoff sleep and drops the
//! socket in the same step — a late timer can never resurrect a
//! torn-down connection. The reconnect counter resets only on a
//! successful handshake; connect failures and closures share the same
//! transient path. Close code 1008 is the server's credential-rejection
//! signal and is terminal: the slot is released and only a fresh client
//! (with a fresh token in the URL) may connect again.
//!
//! Inbound text frames are decoded and normalized before delivery; a
//! frame that fails to decode is dropped with a warning and never crashes
//! the connection or the handler. Frames are delivered in arrival order,
//! one at a time.

#[cfg(test)]
#[path = "stream_test.rs"]
mod stream_test;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::error::StreamError;
use crate::types::{LiveUpdate, PensSnapshot};
use crate::validate::{normalize_live_update, normalize_snapshot};

const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 30_000;
/// Close code the server uses to reject the connection credential.
const AUTH_REJECTED_CODE: u16 = 1008;
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// One observation from the underlying socket.
#[derive(Debug)]
pub enum SocketEvent {
    /// A text frame arrived.
    Frame(String),
    /// The peer closed the connection, with the close code if present.
    Closed(Option<u16>),
    /// Transport failure; ends the connection like a transient closure.
    Error(String),
}

/// Injected duplex-connection capability.
pub trait Connector: Send + 'static {
    type Socket: Socket;

    fn connect(&mut self, url: &str)
        -> impl Future<Output = Result<Self::Socket, String>> + Send;
}

/// One live duplex connection.
pub trait Socket: Send {
    fn next_event(&mut self) -> impl Future<Output = SocketEvent> + Send;
}

/// Production connector over tokio-tungstenite.
pub struct WsConnector;

impl Connector for WsConnector {
    type Socket = WsSocket;

    async fn connect(&mut self, url: &str) -> Result<WsSocket, String> {
        let (stream, _) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|error| error.to_string())?;
        Ok(WsSocket { stream })
    }
}

pub struct WsSocket {
    stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
}

impl Socket for WsSocket {
    async fn next_event(&mut self) -> SocketEvent {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return SocketEvent::Frame(text.to_string()),
                Some(Ok(Message::Close(frame))) => {
                    return SocketEvent::Closed(frame.map(|f| u16::from(f.code)));
                }
                // Binary/ping/pong are not part of this protocol.
                Some(Ok(_)) => {}
                Some(Err(error)) => return SocketEvent::Error(error.to_string()),
                None => return SocketEvent::Closed(None),
            }
        }
    }
}

/// A validated inbound frame.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    /// Full snapshot from the all-pens stream.
    Snapshot(PensSnapshot),
    /// One time-series point from a single-pen stream.
    Update(LiveUpdate),
}

/// Callback set registered for one subscription.
pub struct StreamHandlers {
    pub on_message: Box<dyn FnMut(StreamMessage) + Send>,
    pub on_error: Option<Box<dyn FnMut(StreamError) + Send>>,
    /// Fired at most once, on the 1008 close path only. A data-channel
    /// error never implies it.
    pub on_auth_failure: Option<Box<dyn FnOnce() + Send>>,
    pub max_retries: u32,
}

impl StreamHandlers {
    pub fn new(on_message: impl FnMut(StreamMessage) + Send + 'static) -> Self {
        Self {
            on_message: Box::new(on_message),
            on_error: None,
            on_auth_failure: None,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    #[must_use]
    pub fn on_error(mut self, handler: impl FnMut(StreamError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn on_auth_failure(mut self, handler: impl FnOnce() + Send + 'static) -> Self {
        self.on_auth_failure = Some(Box::new(handler));
        self
    }

    #[must_use]
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Connection-slot state, observable from outside the task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Connecting,
    Open,
    Terminated,
}

struct Shared {
    connected: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn new(state: StreamState) -> Self {
        Self {
            connected: AtomicBool::new(false),
            state: AtomicU8::new(state as u8),
        }
    }

    fn set_state(&self, state: StreamState) {
        self.state.store(state as u8, Ordering::SeqCst);
        self.connected
            .store(state == StreamState::Open, Ordering::SeqCst);
    }

    fn state(&self) -> StreamState {
        match self.state.load(Ordering::SeqCst) {
            0 => StreamState::Idle,
            1 => StreamState::Connecting,
            2 => StreamState::Open,
            _ => StreamState::Terminated,
        }
    }
}

/// Owner of one logical connection slot.
///
/// At most one live connection exists per instance by construction: the
/// single spawned task is the only thing that ever connects. A terminated
/// client is not reusable — a new target address (for example a new token
/// after re-login) means a new instance.
pub struct StreamClient {
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl StreamClient {
    /// Activate a subscription to `url`, or stay idle on `None`.
    #[must_use]
    pub fn connect(url: Option<String>, handlers: StreamHandlers) -> Self {
        Self::with_connector(WsConnector, url, handlers)
    }

    /// Same, over an injected connector.
    #[must_use]
    pub fn with_connector<C: Connector>(
        connector: C,
        url: Option<String>,
        handlers: StreamHandlers,
    ) -> Self {
        let shared = Arc::new(Shared::new(StreamState::Idle));
        let task = url.map(|url| {
            let shared = Arc::clone(&shared);
            tokio::spawn(run_subscription(connector, url, handlers, shared))
        });
        Self { shared, task }
    }

    /// Current connectivity.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn state(&self) -> StreamState {
        self.shared.state()
    }

    /// Tear down the slot: cancels any pending backoff timer and closes
    /// the socket in one step.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            self.shared.set_state(StreamState::Terminated);
        }
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build the all-pens stream address from an http(s) base URL. The token
/// rides as a query credential; the WS handshake carries no header
/// channel.
///
/// # Errors
///
/// [`StreamError::InvalidUrl`] when the base is not http(s).
pub fn ws_pens_url(base_url: &str, token: &str) -> Result<String, StreamError> {
    let base = ws_base(base_url)?;
    Ok(format!("{base}/ws/pens?token={token}"))
}

/// Build a single-pen stream address.
///
/// # Errors
///
/// [`StreamError::InvalidUrl`] when the base is not http(s).
pub fn ws_pen_url(base_url: &str, pen_id: i64, token: &str) -> Result<String, StreamError> {
    let base = ws_base(base_url)?;
    Ok(format!("{base}/ws/pens/{pen_id}?token={token}"))
}

fn ws_base(base_url: &str) -> Result<String, StreamError> {
    let trimmed = base_url.trim_end_matches('/');
    if let Some(rest) = trimmed.strip_prefix("http://") {
        return Ok(format!("ws://{rest}"));
    }
    if let Some(rest) = trimmed.strip_prefix("https://") {
        return Ok(format!("wss://{rest}"));
    }
    Err(StreamError::InvalidUrl(base_url.to_owned()))
}

/// Connection lifecycle: connect, drive, and reconnect with backoff until
/// terminated.
async fn run_subscription<C: Connector>(
    mut connector: C,
    url: String,
    mut handlers: StreamHandlers,
    shared: Arc<Shared>,
) {
    let mut attempts: u32 = 0;

    loop {
        shared.set_state(StreamState::Connecting);

        match connector.connect(&url).await {
            Ok(mut socket) => {
                tracing::debug!(url = %url, "subscription open");
                attempts = 0;
                shared.set_state(StreamState::Open);

                let close_code = drive_socket(&mut socket, &mut handlers).await;
                shared.set_state(StreamState::Connecting);

                if close_code == Some(AUTH_REJECTED_CODE) {
                    tracing::warn!("subscription credential rejected; not reconnecting");
                    shared.set_state(StreamState::Terminated);
                    if let Some(on_auth_failure) = handlers.on_auth_failure.take() {
                        on_auth_failure();
                    }
                    return;
                }
                tracing::debug!(?close_code, "subscription closed");
            }
            Err(error) => {
                tracing::warn!(%error, "subscription connect failed");
                if let Some(on_error) = handlers.on_error.as_mut() {
                    on_error(StreamError::Connect(error));
                }
            }
        }

        if attempts >= handlers.max_retries {
            tracing::warn!(attempts, "subscription retry budget spent");
            shared.set_state(StreamState::Terminated);
            return;
        }

        let delay = backoff_delay(attempts);
        attempts += 1;
        tokio::time::sleep(delay).await;
    }
}

/// Process inbound events until the connection ends; returns the close
/// code, if the peer sent one.
async fn drive_socket<S: Socket>(socket: &mut S, handlers: &mut StreamHandlers) -> Option<u16> {
    loop {
        match socket.next_event().await {
            SocketEvent::Frame(text) => match decode_frame(&text) {
                Some(message) => (handlers.on_message)(message),
                None => tracing::warn!("dropping undecodable frame"),
            },
            SocketEvent::Closed(code) => return code,
            SocketEvent::Error(error) => {
                tracing::warn!(%error, "subscription transport error");
                if let Some(on_error) = handlers.on_error.as_mut() {
                    on_error(StreamError::Transport(error));
                }
                return None;
            }
        }
    }
}

/// Decode and normalize one inbound text frame. `None` means the frame is
/// dropped (malformed, or neither known channel shape).
fn decode_frame(text: &str) -> Option<StreamMessage> {
    let raw: Value = serde_json::from_str(text).ok()?;
    if raw.get("data").is_some() {
        return normalize_live_update(&raw).map(StreamMessage::Update);
    }
    if raw.get("piggeies").is_some() {
        return Some(StreamMessage::Snapshot(normalize_snapshot(&raw)));
    }
    None
}

/// `min(1000 ms × 2^attempts, 30 000 ms)`.
fn backoff_delay(attempts: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1_u64 << attempts.min(16));
    Duration::from_millis(exp.min(BACKOFF_CAP_MS))
}
