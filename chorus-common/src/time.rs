//! Timestamp utilities
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microsecond precision,
//! `Z` suffix) so that lexical order in SQLite equals chronological order.

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Current time, formatted for storage
pub fn now_db() -> String {
    to_db(&now())
}
