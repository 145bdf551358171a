//! Instrumentation settings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default header carrying the correlation id.
pub const DEFAULT_REQUEST_ID_HEADER: &str = "X-Request-ID";
/// Default name of the request counter.
pub const DEFAULT_REQUEST_COUNTER: &str = "http_requests_total";
/// Default name of the request duration series.
pub const DEFAULT_REQUEST_HISTOGRAM: &str = "http_request_duration_seconds";

/// Configuration of [`InstrumentationMiddleware`](super::InstrumentationMiddleware).
///
/// # Example
///
/// ```
/// use sightline_core::middleware::MiddlewareConfig;
/// use std::time::Duration;
///
/// let config = MiddlewareConfig::default()
///     .with_exclude_paths(["/health", "/internal/*"])
///     .with_write_timeout(Duration::from_millis(50));
///
/// assert!(config.is_excluded("/internal/debug"));
/// assert!(!config.is_excluded("/api/users"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MiddlewareConfig {
    /// Paths that are served but not recorded. A trailing `*` matches any
    /// suffix.
    pub exclude_paths: Vec<String>,
    /// Header carrying the correlation id, matched case-insensitively.
    pub request_id_header: String,
    /// Whether to write one log entry per request.
    pub log_requests: bool,
    /// Whether to write the counter and duration samples.
    pub record_metrics: bool,
    /// Name of the request counter.
    pub request_counter_name: String,
    /// Name of the request duration series.
    pub request_histogram_name: String,
    /// Upper bound on how long recording may take. `None` waits for the
    /// stores.
    pub write_timeout: Option<Duration>,
}

impl Default for MiddlewareConfig {
    fn default() -> Self {
        Self {
            exclude_paths: Vec::new(),
            request_id_header: DEFAULT_REQUEST_ID_HEADER.to_string(),
            log_requests: true,
            record_metrics: true,
            request_counter_name: DEFAULT_REQUEST_COUNTER.to_string(),
            request_histogram_name: DEFAULT_REQUEST_HISTOGRAM.to_string(),
            write_timeout: None,
        }
    }
}

impl MiddlewareConfig {
    /// Replaces the excluded paths.
    #[must_use]
    pub fn with_exclude_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the correlation id header.
    #[must_use]
    pub fn with_request_id_header(mut self, header: impl Into<String>) -> Self {
        self.request_id_header = header.into();
        self
    }

    /// Bounds the time spent recording.
    #[must_use]
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Returns true if `path` matches an exclusion pattern.
    #[must_use]
    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_paths.iter().any(|pattern| match pattern.strip_suffix('*') {
            Some(prefix) => path.starts_with(prefix),
            None => path == pattern,
        })
    }
}
