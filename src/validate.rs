//! Permissive normalization of untrusted network payloads.
//!
//! DESIGN
//! ======
//! This module is the single trust boundary between raw decoded JSON and
//! the rest of the crate. The policy is drop-then-coerce, applied
//! recursively: array elements that are not objects are dropped, and
//! every remaining field is coerced to a safe default — `0` for numbers,
//! `""` or a named placeholder for strings. Nothing here ever returns an
//! error or panics; garbage in, empty-but-well-typed out. Downstream code
//! may therefore assume every gauge is finite and every identifier is a
//! string.

#[cfg(test)]
#[path = "validate_test.rs"]
mod validate_test;

use serde_json::Value;

use crate::types::{AbnormalPig, LiveUpdate, Pen, PensSnapshot, Piggery, TimeSeriesPoint};

/// Coerce an arbitrary decoded payload into a [`PensSnapshot`].
///
/// Total function: non-object input, a missing or non-array `piggeies`
/// field, and malformed nested entries all collapse into well-typed
/// defaults rather than errors. Idempotent over its own (re-encoded)
/// output.
#[must_use]
pub fn normalize_snapshot(raw: &Value) -> PensSnapshot {
    let Some(groups) = raw.get("piggeies").and_then(Value::as_array) else {
        return PensSnapshot::default();
    };

    PensSnapshot {
        piggeies: groups
            .iter()
            .filter(|group| group.is_object())
            .map(normalize_piggery)
            .collect(),
    }
}

/// Coerce one single-pen stream frame into a [`LiveUpdate`].
///
/// Returns `None` when the frame is not an object carrying a `data`
/// object — the caller drops such frames. Present-but-malformed scalar
/// fields coerce the same way snapshot fields do.
#[must_use]
pub fn normalize_live_update(raw: &Value) -> Option<LiveUpdate> {
    let data = raw.get("data")?;
    if !data.is_object() {
        return None;
    }

    Some(LiveUpdate {
        pen_id: string_field(raw, "pen_id", ""),
        timestamp: string_field(raw, "timestamp", ""),
        data: TimeSeriesPoint {
            activity: gauge_field(data, "activity"),
            feeding_time: gauge_field(data, "feeding_time"),
        },
    })
}

fn normalize_piggery(raw: &Value) -> Piggery {
    Piggery {
        piggery_id: string_field(raw, "piggery_id", ""),
        piggery_name: string_field(raw, "piggery_name", "Unknown Farm"),
        total_pigs: count_field(raw, "total_pigs"),
        pens: object_list(raw.get("pens"), normalize_pen),
    }
}

fn normalize_pen(raw: &Value) -> Pen {
    Pen {
        pen_id: string_field(raw, "pen_id", ""),
        pen_name: string_field(raw, "pen_name", "Unknown Pen"),
        current_pig_count: count_field(raw, "current_pig_count"),
        avg_activity_level: gauge_field(raw, "avg_activity_level"),
        avg_feeding_time_minutes: gauge_field(raw, "avg_feeding_time_minutes"),
        avg_temperature_celsius: gauge_field(raw, "avg_temperature_celsius"),
        abnormal_pigs: object_list(raw.get("abnormal_pigs"), normalize_abnormal_pig),
    }
}

fn normalize_abnormal_pig(raw: &Value) -> AbnormalPig {
    AbnormalPig {
        wid: count_field(raw, "wid"),
        thumbnail_url: string_field(raw, "thumbnail_url", ""),
        activity: gauge_field(raw, "activity"),
        feeding_time: gauge_field(raw, "feeding_time"),
    }
}

/// Map a maybe-array of maybe-objects, dropping everything that is not an
/// object before coercing the survivors.
fn object_list<T>(raw: Option<&Value>, normalize: fn(&Value) -> T) -> Vec<T> {
    raw.and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter(|entry| entry.is_object())
                .map(normalize)
                .collect()
        })
        .unwrap_or_default()
}

/// String field with a per-field fallback; empty strings fall back too, so
/// name fields never render blank.
fn string_field(raw: &Value, key: &str, fallback: &str) -> String {
    raw.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map_or_else(|| fallback.to_owned(), ToOwned::to_owned)
}

/// Finite float or zero.
fn gauge_field(raw: &Value, key: &str) -> f64 {
    raw.get(key)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Integer count, accepting a float on the wire, or zero.
#[allow(clippy::cast_possible_truncation)]
fn count_field(raw: &Value, key: &str) -> i64 {
    let value = raw.get(key);
    value.and_then(Value::as_i64).unwrap_or_else(|| {
        value
            .and_then(Value::as_f64)
            .filter(|n| n.is_finite())
            .map_or(0, |n| n as i64)
    })
}
