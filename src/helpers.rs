//! Shared helpers for date parsing and numeric cleanup.
//!
//! Source files are loosely typed: dates may carry a time suffix and numbers
//! may be missing or non-finite. These helpers normalise them in one place.

use chrono::{NaiveDate, NaiveDateTime};

/// Parse an ISO-8601 date, accepting a trailing time component
/// (`2025-01-06`, `2025-01-06T00:00:00`, `2025-01-06T00:00:00+01:00`).
pub(crate) fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(date);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.date());
    }
    chrono::DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.date_naive())
}

/// Round to a fixed number of decimal places.
pub(crate) fn round_dp(v: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (v * factor).round() / factor
}

/// Use `v` when present and finite, otherwise `default`.
pub(crate) fn finite_or(v: Option<f64>, default: f64) -> f64 {
    match v {
        Some(x) if x.is_finite() => x,
        Some(x) => {
            tracing::warn!("non-finite value {} replaced by default {}", x, default);
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso_date_plain() {
        assert_eq!(
            parse_iso_date("2025-01-06"),
            NaiveDate::from_ymd_opt(2025, 1, 6)
        );
    }

    #[test]
    fn test_parse_iso_date_with_time() {
        assert_eq!(
            parse_iso_date("2025-01-06T00:00:00"),
            NaiveDate::from_ymd_opt(2025, 1, 6)
        );
        assert_eq!(
            parse_iso_date("2025-01-06T23:00:00+01:00"),
            NaiveDate::from_ymd_opt(2025, 1, 6)
        );
    }

    #[test]
    fn test_parse_iso_date_rejects_garbage() {
        assert_eq!(parse_iso_date("06/01/2025"), None);
        assert_eq!(parse_iso_date(""), None);
        assert_eq!(parse_iso_date("2025-02-30"), None);
    }

    #[test]
    fn test_round_dp() {
        assert_eq!(round_dp(0.123456, 3), 0.123);
        assert_eq!(round_dp(0.5555, 2), 0.56);
    }

    #[test]
    fn test_finite_or() {
        assert_eq!(finite_or(Some(3.5), 10.0), 3.5);
        assert_eq!(finite_or(None, 10.0), 10.0);
        assert_eq!(finite_or(Some(f64::NAN), 10.0), 10.0);
        assert_eq!(finite_or(Some(f64::INFINITY), 10.0), 10.0);
    }
}
