use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

/// Parse a signed-payload timestamp: RFC 3339 text, or Unix seconds as a
/// number or numeric string.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    raw.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

/// Whether `timestamp` lies within `window` of `now`, in either direction.
/// Both ends of the window are inclusive.
pub fn verify_freshness_at(timestamp: DateTime<Utc>, window: Duration, now: DateTime<Utc>) -> bool {
    let skew = now.signed_duration_since(timestamp);
    skew <= window && skew >= -window
}

/// Freshness of a textual timestamp against the wall clock. Unparsable
/// timestamps are never fresh.
pub fn verify_freshness(timestamp: &str, window_ms: u64) -> bool {
    match parse_timestamp_str(timestamp) {
        Some(ts) => verify_freshness_at(ts, window(window_ms), Utc::now()),
        None => false,
    }
}

pub(crate) fn window(window_ms: u64) -> Duration {
    Duration::milliseconds(i64::try_from(window_ms).unwrap_or(i64::MAX / 1_000_000))
}
