//! Wire types for the telemetry service's REST and WebSocket payloads.
//!
//! These are the shapes *after* normalization (see [`crate::validate`]):
//! every numeric gauge is a finite number and every identifier is a
//! string. Serialized field names match the service's wire names exactly,
//! including `piggeies` — the misspelling is part of the deployed API.

use serde::{Deserialize, Serialize};

/// Successful `POST /auth/login` response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Opaque bearer token; owned by the session store after login.
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: i64,
}

/// An individual animal flagged as behaviorally abnormal within a pen.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AbnormalPig {
    /// Numeric subject identifier assigned by the vision system.
    pub wid: i64,
    /// Thumbnail reference; empty when no capture is available.
    pub thumbnail_url: String,
    pub activity: f64,
    pub feeding_time: f64,
}

/// One pen's current gauges and flagged subjects.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pen {
    pub pen_id: String,
    pub pen_name: String,
    pub current_pig_count: i64,
    pub avg_activity_level: f64,
    pub avg_feeding_time_minutes: f64,
    pub avg_temperature_celsius: f64,
    pub abnormal_pigs: Vec<AbnormalPig>,
}

/// A farm grouping: one building holding an ordered sequence of pens.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Piggery {
    pub piggery_id: String,
    pub piggery_name: String,
    pub total_pigs: i64,
    pub pens: Vec<Pen>,
}

/// Full current-state payload across all farm groupings and pens.
///
/// Returned by `GET /pens` and pushed as a whole on the all-pens stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PensSnapshot {
    pub piggeies: Vec<Piggery>,
}

/// One (activity, feeding-time) pair. Sequence position is implicit and
/// assigned by the consumer, not carried on the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub activity: f64,
    pub feeding_time: f64,
}

/// `GET /pens/{id}/detail` response: identity plus the recent series.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PenDetail {
    pub id: i64,
    pub name: String,
    pub time_series: Vec<TimeSeriesPoint>,
}

/// One frame on a single-pen stream: exactly one new series point.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub pen_id: String,
    /// Server-side timestamp string; opaque to this client.
    pub timestamp: String,
    pub data: TimeSeriesPoint,
}
