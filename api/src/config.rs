//! Server configuration module.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use anyhow::{bail, Context, Result};
use sightline_core::config::{RetentionConfig, RetentionPolicy};
use sightline_core::middleware::MiddlewareConfig;
use std::fmt;
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_RING_CAPACITY: usize = 10_000;

/// Which backend holds logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    /// Unbounded in-process vectors.
    #[default]
    Memory,
    /// Fixed-capacity in-process ring buffers.
    Ring,
    /// SQLite, in memory or on disk.
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "ring" => Ok(Self::Ring),
            "sqlite" => Ok(Self::Sqlite),
            other => bail!("unknown storage backend '{other}' (expected memory, ring or sqlite)"),
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Memory => "memory",
            Self::Ring => "ring",
            Self::Sqlite => "sqlite",
        })
    }
}

/// Server configuration.
///
/// Configuration values can be set via environment variables:
/// - `SIGHTLINE_HOST`: The host address to bind to (default: "0.0.0.0")
/// - `SIGHTLINE_PORT`: The port to listen on (default: 8080)
/// - `SIGHTLINE_STORAGE`: `memory`, `ring` or `sqlite` (default: `memory`)
/// - `SIGHTLINE_DB_PATH`: SQLite file, or `:memory:` (default: `:memory:`)
/// - `SIGHTLINE_RING_CAPACITY`: ring buffer size per store (default: 10000)
/// - `SIGHTLINE_SWEEP_INTERVAL_SECS`: retention sweep interval (default: 30)
/// - `SIGHTLINE_LOG_MAX_AGE_SECS` / `SIGHTLINE_LOG_MAX_COUNT`: log retention
///   (default: 86400 / 100000)
/// - `SIGHTLINE_METRIC_MAX_AGE_SECS` / `SIGHTLINE_METRIC_MAX_COUNT`: metric
///   retention (default: 86400 / 100000)
/// - `SIGHTLINE_EXCLUDE_PATHS`: comma-separated paths that are not recorded
///   (default: `/health`)
/// - `SIGHTLINE_REQUEST_ID_HEADER`: correlation header (default: `X-Request-ID`)
/// - `SIGHTLINE_WRITE_TIMEOUT_MS`: bound on instrumentation writes (default: unbounded)
#[derive(Debug, Clone)]
pub struct Config {
    /// The host address to bind to.
    pub host: String,
    /// The port to listen on.
    pub port: u16,
    /// Storage backend.
    pub storage: StorageKind,
    /// SQLite location when `storage` is `sqlite`.
    pub db_path: String,
    /// Per-store capacity when `storage` is `ring`.
    pub ring_capacity: NonZeroUsize,
    /// Retention policies and sweep interval.
    pub retention: RetentionConfig,
    /// Request instrumentation settings.
    pub middleware: MiddlewareConfig,
}

impl Config {
    /// Creates a new configuration from environment variables.
    ///
    /// A `.env` file in the working directory is loaded first, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set but cannot be parsed, or if the
    /// resulting retention settings are invalid.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`Config::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let host = lookup("SIGHTLINE_HOST").unwrap_or(defaults.host);
        let port = parse_var(&lookup, "SIGHTLINE_PORT")?.unwrap_or(defaults.port);
        let storage = parse_var(&lookup, "SIGHTLINE_STORAGE")?.unwrap_or(defaults.storage);
        let db_path = lookup("SIGHTLINE_DB_PATH").unwrap_or(defaults.db_path);
        let ring_capacity =
            parse_var(&lookup, "SIGHTLINE_RING_CAPACITY")?.unwrap_or(defaults.ring_capacity);

        let retention = RetentionConfig {
            logs: RetentionPolicy::new(
                parse_var(&lookup, "SIGHTLINE_LOG_MAX_AGE_SECS")?
                    .unwrap_or(defaults.retention.logs.max_age_seconds),
                parse_var(&lookup, "SIGHTLINE_LOG_MAX_COUNT")?
                    .unwrap_or(defaults.retention.logs.max_count),
            ),
            metrics: RetentionPolicy::new(
                parse_var(&lookup, "SIGHTLINE_METRIC_MAX_AGE_SECS")?
                    .unwrap_or(defaults.retention.metrics.max_age_seconds),
                parse_var(&lookup, "SIGHTLINE_METRIC_MAX_COUNT")?
                    .unwrap_or(defaults.retention.metrics.max_count),
            ),
            interval: parse_var(&lookup, "SIGHTLINE_SWEEP_INTERVAL_SECS")?
                .map_or(defaults.retention.interval, Duration::from_secs),
        };
        retention
            .validate()
            .context("invalid retention configuration")?;

        let mut middleware = defaults.middleware;
        if let Some(paths) = lookup("SIGHTLINE_EXCLUDE_PATHS") {
            middleware = middleware.with_exclude_paths(
                paths
                    .split(',')
                    .map(str::trim)
                    .filter(|path| !path.is_empty()),
            );
        }
        if let Some(header) = lookup("SIGHTLINE_REQUEST_ID_HEADER") {
            middleware = middleware.with_request_id_header(header);
        }
        if let Some(millis) = parse_var::<u64>(&lookup, "SIGHTLINE_WRITE_TIMEOUT_MS")? {
            middleware = middleware.with_write_timeout(Duration::from_millis(millis));
        }

        Ok(Self {
            host,
            port,
            storage,
            db_path,
            ring_capacity,
            retention,
            middleware,
        })
    }

    /// Returns the socket address for binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the host and port do not form a valid socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid socket address {}:{}", self.host, self.port))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageKind::Memory,
            db_path: ":memory:".to_string(),
            ring_capacity: NonZeroUsize::new(DEFAULT_RING_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            retention: RetentionConfig::default(),
            middleware: MiddlewareConfig::default().with_exclude_paths(["/health"]),
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    lookup(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{name}={raw:?} is invalid: {e}"))
        })
        .transpose()
}
