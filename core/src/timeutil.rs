//! TTL conversion and expiry formatting

use chrono::DateTime;

use crate::models::ttl::TimeUnit;

/// Convert a TTL to a whole hour count.
///
/// Months are calendar-approximate: 30 days, 720 hours. The backend only
/// ever receives hour counts, so the approximation is part of the wire
/// contract and must not be corrected to calendar months.
pub fn to_hours(value: u64, unit: TimeUnit) -> u64 {
    match unit {
        TimeUnit::Hour => value,
        TimeUnit::Day => value * 24,
        TimeUnit::Month => value * 24 * 30,
    }
}

/// Format an epoch-seconds expiry for display.
///
/// The backend sends expiry as a string; "0", empty, negative, or anything
/// non-numeric means no TTL is scheduled and renders as the literal "None".
/// Dependent code matches on that token, so it must be preserved exactly.
pub fn format_expiry(raw: &str) -> String {
    match raw.trim().parse::<i64>() {
        Ok(secs) => format_expiry_secs(secs),
        Err(_) => "None".to_string(),
    }
}

/// Numeric entry point for [`format_expiry`]
pub fn format_expiry_secs(secs: i64) -> String {
    if secs <= 0 {
        return "None".to_string();
    }
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%b %-d, %Y, %-I:%M:%S %p").to_string(),
        None => "None".to_string(),
    }
}
