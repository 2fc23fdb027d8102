//! Store key layout
//!
//! Every role gets its own prefix so counters, type sets, recency indexes
//! and status labels can never address the same key.

use chrono::{DateTime, Duration, Utc};

pub const PREFIX_COUNTER: &str = "ua:cnt";
pub const PREFIX_TYPE_SET: &str = "ua:types";
pub const PREFIX_STATUS: &str = "ua:status";
pub const PREFIX_RECENCY: &str = "ua:ts";

/// Fixed-width UTC hour, so lexical and temporal order agree.
const BUCKET_FORMAT: &str = "%Y%m%d%H";

/// 9999-12-31T23:59:59Z. Later instants no longer format as four-digit years.
pub const LAST_BUCKET_SECS: i64 = 253_402_300_799;

/// Start of the UTC hour containing `t`.
pub fn hour_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(3600);
    DateTime::from_timestamp(floored, 0).unwrap_or(t)
}

pub fn bucket_key(user_id: &str, action_type: &str, t: DateTime<Utc>) -> String {
    format!(
        "{}:{}:{}:{}",
        PREFIX_COUNTER,
        user_id,
        action_type,
        t.format(BUCKET_FORMAT)
    )
}

/// Keys for `hours` consecutive buckets ending at the hour of `now`,
/// newest first.
pub fn window_keys(user_id: &str, action_type: &str, now: DateTime<Utc>, hours: i64) -> Vec<String> {
    let current = hour_floor(now);
    (0..hours)
        .map(|i| bucket_key(user_id, action_type, current - Duration::hours(i)))
        .collect()
}

pub fn types_key(user_id: &str) -> String {
    format!("{}:{}", PREFIX_TYPE_SET, user_id)
}

pub fn recency_key(user_id: &str, action_type: &str) -> String {
    format!("{}:{}:{}", PREFIX_RECENCY, user_id, action_type)
}

pub fn status_key(user_id: &str) -> String {
    format!("{}:{}", PREFIX_STATUS, user_id)
}
