//! Read-boundary parameter handling.
//!
//! Filters arriving from outside (query strings, CLI flags) are normalised to
//! permissive defaults instead of being rejected: a `since` that is not a
//! finite number reads from the beginning and an unknown `level` applies no
//! filter.
//!
//! # Example
//!
//! ```
//! use sightline_core::models::LogLevel;
//! use sightline_core::query::{parse_level, parse_since, ReadParams};
//!
//! assert_eq!(parse_since("12.5"), 12.5);
//! assert_eq!(parse_since("yesterday"), 0.0);
//! assert_eq!(parse_level(Some("warning")), Some(LogLevel::Warn));
//! assert_eq!(parse_level(Some("loud")), None);
//!
//! let params = ReadParams { since: Some("inf".into()), level: Some("ERROR".into()) };
//! let query = params.log_query();
//! assert_eq!(query.since, 0.0);
//! assert_eq!(query.level, Some(LogLevel::Error));
//! ```

use crate::models::LogLevel;
use crate::storage::LogQuery;
use serde::Deserialize;

/// Parses a `since` timestamp. Anything that is not a finite number becomes
/// `0.0`; negative values are kept.
#[must_use]
pub fn parse_since(raw: &str) -> f64 {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|since| since.is_finite())
        .unwrap_or(0.0)
}

/// Parses a level filter, case-insensitively. Unknown or empty values mean
/// no filter.
#[must_use]
pub fn parse_level(raw: Option<&str>) -> Option<LogLevel> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(level) => Some(level),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unknown level filter");
            None
        }
    }
}

/// Raw read parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadParams {
    /// Exclusive lower timestamp bound.
    pub since: Option<String>,
    /// Level filter.
    pub level: Option<String>,
}

impl ReadParams {
    /// Normalised `since`.
    #[must_use]
    pub fn since(&self) -> f64 {
        self.since.as_deref().map_or(0.0, parse_since)
    }

    /// Normalised log query.
    #[must_use]
    pub fn log_query(&self) -> LogQuery {
        LogQuery {
            since: self.since(),
            level: parse_level(self.level.as_deref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_since_valid() {
        assert!((parse_since("0") - 0.0).abs() < f64::EPSILON);
        assert!((parse_since(" 1700000000.25 ") - 1_700_000_000.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_since_invalid_becomes_zero() {
        for raw in ["", "abc", "NaN", "inf", "-inf", "1e400"] {
            assert!(parse_since(raw).abs() < f64::EPSILON, "{raw}");
        }
    }

    #[test]
    fn test_parse_since_keeps_negative_timestamps() {
        assert!((parse_since("-1") + 1.0).abs() < f64::EPSILON);
        assert!((parse_since("-1700.5") + 1700.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level(Some("debug")), Some(LogLevel::Debug));
        assert_eq!(parse_level(Some("INFO")), Some(LogLevel::Info));
        assert_eq!(parse_level(Some("Warning")), Some(LogLevel::Warn));
        assert_eq!(parse_level(Some("error")), Some(LogLevel::Error));
        assert_eq!(parse_level(Some("CRITICAL")), Some(LogLevel::Critical));
        assert_eq!(parse_level(Some("verbose")), None);
        assert_eq!(parse_level(Some("  ")), None);
        assert_eq!(parse_level(None), None);
    }

    #[test]
    fn test_read_params_deserialize_and_normalise() {
        let params: ReadParams =
            serde_json::from_str(r#"{"since": "not-a-number", "level": "nope"}"#).unwrap();
        assert_eq!(params.log_query(), LogQuery::default());

        let params = ReadParams::default();
        assert!(params.since().abs() < f64::EPSILON);
    }
}
