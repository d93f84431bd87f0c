use std::time::SystemTime;

use chrono::{SecondsFormat, Utc};

mod task;
pub use task::JoinMap;

/// Returns the current UNIX timestamp in milliseconds.
///
/// A clock set before the epoch yields `0`.
#[inline]
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Returns the current UTC time as an ISO 8601 string with second precision,
/// e.g. `2024-05-01T12:30:00Z`.
#[inline]
pub fn iso_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}
