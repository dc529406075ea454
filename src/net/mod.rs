//! Network access layer.
//!
//! DESIGN
//! ======
//! Split by transport: `http` holds the injected request/response seam,
//! `api` the retrying REST client over it, `stream` the reconnecting
//! WebSocket subscription client. Both clients read the credential token
//! per attempt and never mutate it; session ownership lives in
//! [`crate::session`].

pub mod api;
pub mod http;
pub mod stream;
