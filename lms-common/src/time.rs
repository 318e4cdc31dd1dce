//! Timestamp utilities
//!
//! Timestamps are stored as integer Unix milliseconds and surfaced as
//! `DateTime<Utc>`.

use chrono::{DateTime, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}

/// Convert stored milliseconds back to a UTC timestamp
///
/// Out-of-range values collapse to the Unix epoch rather than failing a read.
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::UNIX_EPOCH)
}
