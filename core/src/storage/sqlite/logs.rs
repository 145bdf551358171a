//! SQLite log stores.

use crate::models::{Attributes, LogEntry, LogLevel};
use crate::storage::{BlockingLogStore, LogQuery, LogStore, StorageError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Connection, Row};

use super::{AsyncDatabase, BlockingDatabase, SqliteLocation};

const LOG_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp REAL NOT NULL,
        level TEXT NOT NULL,
        message TEXT NOT NULL,
        attributes TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE INDEX IF NOT EXISTS idx_logs_timestamp ON logs(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_logs_level_timestamp ON logs(level, timestamp)",
];

const INSERT_LOG: &str =
    "INSERT INTO logs (timestamp, level, message, attributes) VALUES (?, ?, ?, ?)";

/// A log entry with its attributes already encoded as JSON text.
struct LogRow {
    timestamp: f64,
    level: &'static str,
    message: String,
    attributes: String,
}

impl LogRow {
    fn encode(entry: LogEntry) -> Result<Self, StorageError> {
        Ok(Self {
            timestamp: entry.timestamp,
            level: entry.level.as_str(),
            attributes: serde_json::to_string(&entry.attributes)?,
            message: entry.message,
        })
    }

    fn decode(row: &SqliteRow) -> Result<LogEntry, sqlx::Error> {
        let level: String = row.try_get("level")?;
        let attributes: String = row.try_get("attributes")?;
        Ok(LogEntry {
            timestamp: row.try_get("timestamp")?,
            level: level.parse().unwrap_or_default(),
            message: row.try_get("message")?,
            attributes: serde_json::from_str::<Attributes>(&attributes).unwrap_or_default(),
        })
    }
}

async fn insert(conn: &mut SqliteConnection, rows: Vec<LogRow>) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;
    for row in rows {
        sqlx::query(INSERT_LOG)
            .bind(row.timestamp)
            .bind(row.level)
            .bind(row.message)
            .bind(row.attributes)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

async fn select(conn: &mut SqliteConnection, query: LogQuery) -> Result<Vec<LogEntry>, sqlx::Error> {
    let rows = match query.level {
        Some(level) => {
            sqlx::query(
                "SELECT timestamp, level, message, attributes FROM logs
                 WHERE timestamp > ? AND UPPER(level) = UPPER(?)
                 ORDER BY timestamp ASC, id ASC",
            )
            .bind(query.since)
            .bind(level.as_str())
            .fetch_all(&mut *conn)
            .await?
        }
        None => {
            sqlx::query(
                "SELECT timestamp, level, message, attributes FROM logs
                 WHERE timestamp > ?
                 ORDER BY timestamp ASC, id ASC",
            )
            .bind(query.since)
            .fetch_all(&mut *conn)
            .await?
        }
    };
    rows.iter().map(LogRow::decode).collect()
}

async fn count(conn: &mut SqliteConnection, level: Option<LogLevel>) -> Result<u64, sqlx::Error> {
    let count: i64 = match level {
        Some(level) => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM logs WHERE level = ?")
                .bind(level.as_str())
                .fetch_one(&mut *conn)
                .await?
        }
        None => {
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM logs")
                .fetch_one(&mut *conn)
                .await?
        }
    };
    Ok(u64::try_from(count).unwrap_or_default())
}

async fn delete_before(
    conn: &mut SqliteConnection,
    timestamp: f64,
    level: Option<LogLevel>,
) -> Result<u64, sqlx::Error> {
    let result = match level {
        Some(level) => {
            sqlx::query("DELETE FROM logs WHERE level = ? AND timestamp < ?")
                .bind(level.as_str())
                .bind(timestamp)
                .execute(&mut *conn)
                .await?
        }
        None => {
            sqlx::query("DELETE FROM logs WHERE timestamp < ?")
                .bind(timestamp)
                .execute(&mut *conn)
                .await?
        }
    };
    Ok(result.rows_affected())
}

async fn delete_oldest(conn: &mut SqliteConnection, count: u64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM logs WHERE id IN (
            SELECT id FROM logs ORDER BY timestamp ASC, id ASC LIMIT ?
        )",
    )
    .bind(i64::try_from(count).unwrap_or(i64::MAX))
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

async fn clear(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM logs").execute(&mut *conn).await?;
    Ok(())
}

/// Non-blocking SQLite log store.
///
/// The pool is created on first use.
///
/// # Example
///
/// ```no_run
/// # async fn example() -> Result<(), sightline_core::storage::StorageError> {
/// use sightline_core::models::LogEntry;
/// use sightline_core::storage::{LogQuery, LogStore, SqliteLocation, SqliteLogStore};
///
/// let store = SqliteLogStore::new(SqliteLocation::parse("logs.db"));
/// store.write(LogEntry::info("started")).await?;
/// let logs = store.read(LogQuery::new()).await?;
/// # Ok(())
/// # }
/// ```
pub struct SqliteLogStore {
    db: AsyncDatabase,
}

impl SqliteLogStore {
    /// Creates a store for `location`. Nothing is opened until first use.
    #[must_use]
    pub fn new(location: SqliteLocation) -> Self {
        Self {
            db: AsyncDatabase::new(location, LOG_SCHEMA),
        }
    }

    /// Builds the blocking access mode for the same location.
    ///
    /// For a file location both stores see the same rows. For
    /// [`SqliteLocation::Memory`] the blocking store gets its own empty dataset.
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking runtime cannot be created.
    pub fn blocking(&self) -> Result<BlockingSqliteLogStore, StorageError> {
        BlockingSqliteLogStore::new(self.db.location().clone())
    }

    /// Deletes entries of `level` older than `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_by_level_before(
        &self,
        level: LogLevel,
        timestamp: f64,
    ) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(delete_before(&mut conn, timestamp, Some(level)).await?)
    }

    /// Counts entries of `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub async fn count_by_level(&self, level: LogLevel) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(count(&mut conn, Some(level)).await?)
    }

    /// Closes the pool. Later operations fail.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[async_trait]
impl LogStore for SqliteLogStore {
    async fn write(&self, entry: LogEntry) -> Result<(), StorageError> {
        self.write_batch(vec![entry]).await
    }

    async fn write_batch(&self, entries: Vec<LogEntry>) -> Result<(), StorageError> {
        let rows = entries
            .into_iter()
            .map(LogRow::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.db.acquire().await?;
        Ok(insert(&mut conn, rows).await?)
    }

    async fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(select(&mut conn, query).await?)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(count(&mut conn, None).await?)
    }

    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(delete_before(&mut conn, timestamp, None).await?)
    }

    async fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(delete_oldest(&mut conn, count).await?)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(clear(&mut conn).await?)
    }
}

/// Blocking SQLite log store for synchronous callers.
///
/// Calling it from inside a tokio runtime panics; use
/// `tokio::task::spawn_blocking` there, or the non-blocking [`SqliteLogStore`].
pub struct BlockingSqliteLogStore {
    db: BlockingDatabase,
}

impl BlockingSqliteLogStore {
    /// Creates a store for `location`. Nothing is opened until first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the private runtime cannot be created.
    pub fn new(location: SqliteLocation) -> Result<Self, StorageError> {
        Ok(Self {
            db: BlockingDatabase::new(location, LOG_SCHEMA)?,
        })
    }

    /// Location this store reads from.
    #[must_use]
    pub fn location(&self) -> &SqliteLocation {
        self.db.location()
    }

    /// Deletes entries of `level` older than `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub fn delete_by_level_before(&self, level: LogLevel, timestamp: f64) -> Result<u64, StorageError> {
        self.db
            .run(move |conn| Box::pin(delete_before(conn, timestamp, Some(level))))
    }

    /// Counts entries of `level`.
    ///
    /// # Errors
    ///
    /// Returns an error if the count fails.
    pub fn count_by_level(&self, level: LogLevel) -> Result<u64, StorageError> {
        self.db.run(move |conn| Box::pin(count(conn, Some(level))))
    }
}

impl BlockingLogStore for BlockingSqliteLogStore {
    fn write(&self, entry: LogEntry) -> Result<(), StorageError> {
        let rows = vec![LogRow::encode(entry)?];
        self.db.run(move |conn| Box::pin(insert(conn, rows)))
    }

    fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        self.db.run(move |conn| Box::pin(select(conn, query)))
    }

    fn count(&self) -> Result<u64, StorageError> {
        self.db.run(|conn| Box::pin(count(conn, None)))
    }

    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        self.db
            .run(move |conn| Box::pin(delete_before(conn, timestamp, None)))
    }

    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        self.db.run(move |conn| Box::pin(delete_oldest(conn, count)))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.db.run(|conn| Box::pin(clear(conn)))
    }
}
