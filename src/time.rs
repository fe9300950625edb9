//! Timestamp formatting helpers.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a UTC timestamp as RFC 3339 at second precision with a `Z` suffix,
/// e.g. "2026-08-30T12:00:00Z". Microseconds are dropped.
pub fn iso_z(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
