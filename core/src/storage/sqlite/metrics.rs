//! SQLite metric stores.

use crate::models::{Labels, MetricSample};
use crate::storage::{BlockingMetricStore, MetricStore, StorageError};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Connection, Row};

use super::{AsyncDatabase, BlockingDatabase, SqliteLocation};

const METRIC_SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS metrics (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        timestamp REAL NOT NULL,
        value REAL NOT NULL,
        labels TEXT NOT NULL DEFAULT '{}'
    )",
    "CREATE INDEX IF NOT EXISTS idx_metrics_timestamp ON metrics(timestamp)",
];

struct MetricRow {
    name: String,
    timestamp: f64,
    value: f64,
    labels: String,
}

impl MetricRow {
    fn encode(sample: MetricSample) -> Result<Self, StorageError> {
        Ok(Self {
            labels: serde_json::to_string(&sample.labels)?,
            name: sample.name,
            timestamp: sample.timestamp,
            value: sample.value,
        })
    }

    fn decode(row: &SqliteRow) -> Result<MetricSample, sqlx::Error> {
        let labels: String = row.try_get("labels")?;
        Ok(MetricSample {
            name: row.try_get("name")?,
            timestamp: row.try_get("timestamp")?,
            value: row.try_get("value")?,
            labels: serde_json::from_str::<Labels>(&labels).unwrap_or_default(),
        })
    }
}

async fn insert(conn: &mut SqliteConnection, rows: Vec<MetricRow>) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;
    for row in rows {
        sqlx::query("INSERT INTO metrics (name, timestamp, value, labels) VALUES (?, ?, ?, ?)")
            .bind(row.name)
            .bind(row.timestamp)
            .bind(row.value)
            .bind(row.labels)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await
}

async fn select(conn: &mut SqliteConnection, since: f64) -> Result<Vec<MetricSample>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT name, timestamp, value, labels FROM metrics
         WHERE timestamp > ?
         ORDER BY timestamp ASC, id ASC",
    )
    .bind(since)
    .fetch_all(&mut *conn)
    .await?;
    rows.iter().map(MetricRow::decode).collect()
}

async fn count(conn: &mut SqliteConnection) -> Result<u64, sqlx::Error> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM metrics")
        .fetch_one(&mut *conn)
        .await?;
    Ok(u64::try_from(count).unwrap_or_default())
}

async fn delete_before(conn: &mut SqliteConnection, timestamp: f64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM metrics WHERE timestamp < ?")
        .bind(timestamp)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected())
}

async fn delete_oldest(conn: &mut SqliteConnection, count: u64) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "DELETE FROM metrics WHERE id IN (
            SELECT id FROM metrics ORDER BY timestamp ASC, id ASC LIMIT ?
        )",
    )
    .bind(i64::try_from(count).unwrap_or(i64::MAX))
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

async fn clear(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM metrics").execute(&mut *conn).await?;
    Ok(())
}

/// Non-blocking SQLite metric store.
pub struct SqliteMetricStore {
    db: AsyncDatabase,
}

impl SqliteMetricStore {
    /// Creates a store for `location`. Nothing is opened until first use.
    #[must_use]
    pub fn new(location: SqliteLocation) -> Self {
        Self {
            db: AsyncDatabase::new(location, METRIC_SCHEMA),
        }
    }

    /// Builds the blocking access mode for the same location.
    ///
    /// # Errors
    ///
    /// Returns an error if the blocking runtime cannot be created.
    pub fn blocking(&self) -> Result<BlockingSqliteMetricStore, StorageError> {
        BlockingSqliteMetricStore::new(self.db.location().clone())
    }

    /// Closes the pool.
    pub async fn close(&self) {
        self.db.close().await;
    }
}

#[async_trait]
impl MetricStore for SqliteMetricStore {
    async fn write(&self, sample: MetricSample) -> Result<(), StorageError> {
        self.write_batch(vec![sample]).await
    }

    async fn write_batch(&self, samples: Vec<MetricSample>) -> Result<(), StorageError> {
        let rows = samples
            .into_iter()
            .map(MetricRow::encode)
            .collect::<Result<Vec<_>, _>>()?;
        let mut conn = self.db.acquire().await?;
        Ok(insert(&mut conn, rows).await?)
    }

    async fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(select(&mut conn, since).await?)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(count(&mut conn).await?)
    }

    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        let mut conn = self.db.acquire().await?;
        Ok(delete_before(&mut conn, timestamp).await?)
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

/// Blocking SQLite metric store. Not for use inside an async context.
pub struct BlockingSqliteMetricStore {
    db: BlockingDatabase,
}

impl BlockingSqliteMetricStore {
    /// Creates a store for `location`.
    ///
    /// # Errors
    ///
    /// Returns an error if the private runtime cannot be created.
    pub fn new(location: SqliteLocation) -> Result<Self, StorageError> {
        Ok(Self {
            db: BlockingDatabase::new(location, METRIC_SCHEMA)?,
        })
    }
}

impl BlockingMetricStore for BlockingSqliteMetricStore {
    fn write(&self, sample: MetricSample) -> Result<(), StorageError> {
        let rows = vec![MetricRow::encode(sample)?];
        self.db.run(move |conn| Box::pin(insert(conn, rows)))
    }

    fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError> {
        self.db.run(move |conn| Box::pin(select(conn, since)))
    }

    fn count(&self) -> Result<u64, StorageError> {
        self.db.run(|conn| Box::pin(count(conn)))
    }

    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        self.db.run(move |conn| Box::pin(delete_before(conn, timestamp)))
    }

    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        self.db.run(move |conn| Box::pin(delete_oldest(conn, count)))
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.db.run(|conn| Box::pin(clear(conn)))
    }
}
