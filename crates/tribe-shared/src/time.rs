//! Timestamp coercion.
//!
//! The chat service is loose about timestamps: the same instant may arrive
//! as epoch seconds, epoch milliseconds, a numeric string or an ISO-8601
//! string.  Everything is normalised to epoch milliseconds (`i64`) once, at
//! the wire boundary.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::constants::SECONDS_THRESHOLD;

/// Coerce a raw JSON timestamp into epoch milliseconds.
///
/// Returns `None` for `null`, booleans, objects, non-finite numbers and
/// strings that are neither numeric nor ISO-8601.
pub fn coerce_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(scale(i))
            } else {
                n.as_f64().and_then(float_millis)
            }
        }
        Value::String(s) => parse_time_str(s),
        _ => None,
    }
}

/// Parse a textual timestamp: numeric (seconds or millis) or ISO-8601.
pub fn parse_time_str(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(i) = s.parse::<i64>() {
        return Some(scale(i));
    }
    if let Ok(f) = s.parse::<f64>() {
        return float_millis(f);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).timestamp_millis());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn scale(value: i64) -> i64 {
    if value.abs() < SECONDS_THRESHOLD {
        value.saturating_mul(1000)
    } else {
        value
    }
}

fn float_millis(value: f64) -> Option<i64> {
    if !value.is_finite() {
        return None;
    }
    let scaled = if value.abs() < SECONDS_THRESHOLD as f64 {
        value * 1000.0
    } else {
        value
    };
    Some(scaled.round() as i64)
}
