//! Timestamp utilities
//!
//! Timestamps are stored as fixed-width RFC 3339 strings in UTC so that
//! lexical order in SQLite matches chronological order.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp '{}': {}", value, e)))
}

/// Convert Unix epoch seconds (as reported by the catalog API) to UTC
///
/// Zero and negative values mean "never" upstream and map to `None`.
pub fn from_epoch_seconds(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        return None;
    }
    Utc.timestamp_opt(seconds, 0).single()
}
