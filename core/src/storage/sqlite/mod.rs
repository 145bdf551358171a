//! Durable SQLite storage.
//!
//! Every store comes in two access modes that satisfy the same contract:
//!
//! - [`SqliteLogStore`] / [`SqliteMetricStore`]: non-blocking, backed by a
//!   `sqlx` connection pool. For callers running on a tokio runtime.
//! - [`BlockingSqliteLogStore`] / [`BlockingSqliteMetricStore`]: blocking,
//!   driven by a private current-thread runtime. For synchronous callers.
//!   These must not be called from inside an async context.
//!
//! # Sharing between modes
//!
//! With [`SqliteLocation::File`] both modes open the same database file and
//! observe each other's writes. The non-blocking mode keeps a pool; the
//! blocking mode opens and closes a connection per operation.
//!
//! With [`SqliteLocation::Memory`] the dataset lives inside a connection.
//! Each mode owns its own long-lived connection and therefore its own
//! independent dataset: **data written through one mode is never visible
//! through the other.**
//!
//! Schema creation is lazy. The first operation in each mode creates the
//! tables under a lock; concurrent early callers wait for it.

mod logs;
mod metrics;

pub use logs::{BlockingSqliteLogStore, SqliteLogStore};
pub use metrics::{BlockingSqliteMetricStore, SqliteMetricStore};

use futures::future::BoxFuture;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use sqlx::{ConnectOptions, Connection, Sqlite};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;
use tokio::runtime::Runtime;

use super::StorageError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    /// Volatile, connection-scoped dataset.
    Memory,
    /// Database file on disk, created if missing.
    File(PathBuf),
}

impl SqliteLocation {
    /// Interprets `":memory:"` (or an empty string) as [`SqliteLocation::Memory`]
    /// and anything else as a file path.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | ":memory:" => Self::Memory,
            path => Self::File(PathBuf::from(path)),
        }
    }

    /// Returns true for the volatile configuration.
    #[must_use]
    pub fn is_memory(&self) -> bool {
        matches!(self, Self::Memory)
    }

    /// Builds connection options. Each call for `Memory` names a fresh
    /// dataset, so two option sets never share volatile data.
    fn connect_options(&self) -> Result<SqliteConnectOptions, StorageError> {
        let options = match self {
            Self::Memory => SqliteConnectOptions::from_str("sqlite::memory:")?,
            Self::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(BUSY_TIMEOUT),
        };
        Ok(options)
    }
}

impl fmt::Display for SqliteLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str(":memory:"),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

async fn create_schema(
    conn: &mut SqliteConnection,
    schema: &[&str],
) -> Result<(), sqlx::Error> {
    for &statement in schema {
        sqlx::query(statement).execute(&mut *conn).await?;
    }
    Ok(())
}

/// Non-blocking access: a lazily created pool.
pub(crate) struct AsyncDatabase {
    location: SqliteLocation,
    schema: &'static [&'static str],
    pool: OnceLock<SqlitePool>,
    init: tokio::sync::Mutex<()>,
}

impl AsyncDatabase {
    pub(crate) fn new(location: SqliteLocation, schema: &'static [&'static str]) -> Self {
        Self {
            location,
            schema,
            pool: OnceLock::new(),
            init: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn location(&self) -> &SqliteLocation {
        &self.location
    }

    async fn pool(&self) -> Result<&SqlitePool, StorageError> {
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }

        let _guard = self.init.lock().await;
        if let Some(pool) = self.pool.get() {
            return Ok(pool);
        }

        let options = self.location.connect_options()?;
        let pool = match self.location {
            // The volatile dataset dies with its last connection, so the pool
            // keeps exactly one and never recycles it.
            SqliteLocation::Memory => {
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .min_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_with(options)
                    .await?
            }
            SqliteLocation::File(_) => {
                SqlitePoolOptions::new()
                    .max_connections(5)
                    .acquire_timeout(BUSY_TIMEOUT)
                    .connect_with(options)
                    .await?
            }
        };

        let mut conn = pool.acquire().await?;
        create_schema(&mut conn, self.schema).await?;
        drop(conn);

        tracing::debug!(location = %self.location, "Initialized SQLite schema (async mode)");
        Ok(self.pool.get_or_init(|| pool))
    }

    pub(crate) async fn acquire(&self) -> Result<PoolConnection<Sqlite>, StorageError> {
        Ok(self.pool().await?.acquire().await?)
    }

    pub(crate) async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

/// Blocking access: a private current-thread runtime drives each operation.
pub(crate) struct BlockingDatabase {
    location: SqliteLocation,
    schema: &'static [&'static str],
    options: SqliteConnectOptions,
    runtime: Runtime,
    memory: Mutex<Option<SqliteConnection>>,
    initialized: AtomicBool,
    init: Mutex<()>,
}

impl BlockingDatabase {
    pub(crate) fn new(
        location: SqliteLocation,
        schema: &'static [&'static str],
    ) -> Result<Self, StorageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            options: location.connect_options()?,
            location,
            schema,
            runtime,
            memory: Mutex::new(None),
            initialized: AtomicBool::new(false),
            init: Mutex::new(()),
        })
    }

    pub(crate) fn location(&self) -> &SqliteLocation {
        &self.location
    }

    /// Runs `op` against a connection, creating the schema first if needed.
    pub(crate) fn run<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
    {
        self.ensure_schema()?;
        self.with_connection(op)
    }

    fn ensure_schema(&self) -> Result<(), StorageError> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let _guard = self
            .init
            .lock()
            .map_err(|_| StorageError::LockError("sqlite schema"))?;
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }

        let schema = self.schema;
        self.with_connection(|conn| Box::pin(create_schema(conn, schema)))?;
        self.initialized.store(true, Ordering::Release);

        tracing::debug!(location = %self.location, "Initialized SQLite schema (blocking mode)");
        Ok(())
    }

    fn with_connection<T, F>(&self, op: F) -> Result<T, StorageError>
    where
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, Result<T, sqlx::Error>>,
    {
        if self.location.is_memory() {
            let mut slot = self
                .memory
                .lock()
                .map_err(|_| StorageError::LockError("sqlite connection"))?;
            if slot.is_none() {
                let conn = self.runtime.block_on(self.options.connect())?;
                *slot = Some(conn);
            }
            let Some(conn) = slot.as_mut() else {
                return Err(StorageError::StorageError(
                    "in-memory connection unavailable".to_string(),
                ));
            };
            return Ok(self.runtime.block_on(op(conn))?);
        }

        self.runtime.block_on(async {
            let mut conn = self.options.connect().await?;
            let result = op(&mut conn).await;
            conn.close().await?;
            Ok::<T, StorageError>(result?)
        })
    }
}
