//! Log storage traits and the volatile in-memory implementation.
//!
//! Provides the `LogStore` trait (non-blocking) and its `BlockingLogStore`
//! mirror. Both describe the same contract; backends implement whichever
//! calling convention they support natively, and in-process backends
//! implement both.

use crate::models::{LogEntry, LogLevel};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use super::{remove_oldest, StorageError};

/// Query parameters for reading logs back.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LogQuery {
    /// Only entries with a timestamp strictly greater than this are returned.
    pub since: f64,

    /// Only entries of this level are returned.
    pub level: Option<LogLevel>,
}

impl LogQuery {
    /// Creates a new empty query (returns all logs).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the exclusive lower timestamp bound.
    #[must_use]
    pub fn since(mut self, since: f64) -> Self {
        self.since = since;
        self
    }

    /// Sets the log level filter.
    #[must_use]
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = Some(level);
        self
    }

    /// Returns true if the entry passes every filter.
    #[must_use]
    pub fn matches(&self, entry: &LogEntry) -> bool {
        entry.timestamp > self.since && self.level.map_or(true, |level| entry.level == level)
    }

    /// Applies the query to a set of entries: filters, then sorts ascending by
    /// timestamp. The sort is stable, so equal timestamps keep arrival order.
    pub(crate) fn select<'a>(&self, entries: impl IntoIterator<Item = &'a LogEntry>) -> Vec<LogEntry> {
        let mut selected: Vec<LogEntry> = entries
            .into_iter()
            .filter(|entry| self.matches(entry))
            .cloned()
            .collect();
        selected.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        selected
    }
}

/// Non-blocking log storage.
///
/// Implementations must be thread-safe (Send + Sync) and tolerate concurrent
/// writers. Reads always return entries in ascending timestamp order.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Appends a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist the entry.
    async fn write(&self, entry: LogEntry) -> Result<(), StorageError>;

    /// Appends several entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist any entry.
    async fn write_batch(&self, entries: Vec<LogEntry>) -> Result<(), StorageError> {
        for entry in entries {
            self.write(entry).await?;
        }
        Ok(())
    }

    /// Reads entries matching the query, ascending by timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    async fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError>;

    /// Returns the total number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    async fn count(&self) -> Result<u64, StorageError>;

    /// Deletes entries with a timestamp strictly less than `timestamp` and
    /// returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError>;

    /// Deletes the `count` oldest entries and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    async fn delete_oldest(&self, count: u64) -> Result<u64, StorageError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Blocking mirror of [`LogStore`] for synchronous callers.
pub trait BlockingLogStore: Send + Sync {
    /// Appends a single entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist the entry.
    fn write(&self, entry: LogEntry) -> Result<(), StorageError>;

    /// Reads entries matching the query, ascending by timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError>;

    /// Returns the total number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self) -> Result<u64, StorageError>;

    /// Deletes entries with a timestamp strictly less than `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError>;

    /// Deletes the `count` oldest entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError>;

    /// Removes every entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory log store implementation.
///
/// Stores logs in a `Vec` protected by a `RwLock`. Suitable for development,
/// testing, and short-lived processes.
///
/// **Note:** Data is not persisted across restarts and is not shared between
/// processes.
///
/// # Example
///
/// ```
/// use sightline_core::storage::{BlockingLogStore, InMemoryLogStore, LogQuery};
/// use sightline_core::models::LogEntry;
///
/// let store = InMemoryLogStore::new();
/// store.write(LogEntry::info("Test message")).unwrap();
///
/// let logs = store.read(LogQuery::new()).unwrap();
/// assert_eq!(logs.len(), 1);
/// ```
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    logs: Arc<RwLock<Vec<LogEntry>>>,
}

impl InMemoryLogStore {
    /// Creates a new empty in-memory log store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            logs: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a new in-memory log store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl BlockingLogStore for InMemoryLogStore {
    fn write(&self, entry: LogEntry) -> Result<(), StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::LockError("log store"))?;
        logs.push(entry);
        Ok(())
    }

    fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| StorageError::LockError("log store"))?;
        Ok(query.select(logs.iter()))
    }

    fn count(&self) -> Result<u64, StorageError> {
        let logs = self
            .logs
            .read()
            .map_err(|_| StorageError::LockError("log store"))?;
        Ok(logs.len() as u64)
    }

    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::LockError("log store"))?;
        let before = logs.len();
        logs.retain(|entry| entry.timestamp >= timestamp);
        Ok((before - logs.len()) as u64)
    }

    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::LockError("log store"))?;
        Ok(remove_oldest(&mut logs, count, |entry| entry.timestamp))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::LockError("log store"))?;
        logs.clear();
        Ok(())
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn write(&self, entry: LogEntry) -> Result<(), StorageError> {
        BlockingLogStore::write(self, entry)
    }

    async fn write_batch(&self, entries: Vec<LogEntry>) -> Result<(), StorageError> {
        let mut logs = self
            .logs
            .write()
            .map_err(|_| StorageError::LockError("log store"))?;
        logs.extend(entries);
        Ok(())
    }

    async fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        BlockingLogStore::read(self, query)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        BlockingLogStore::count(self)
    }

    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        BlockingLogStore::delete_before(self, timestamp)
    }

    async fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        BlockingLogStore::delete_oldest(self, count)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        BlockingLogStore::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_at(message: &str, timestamp: f64) -> LogEntry {
        LogEntry::info(message).with_timestamp(timestamp)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryLogStore::new();
        assert_eq!(LogStore::count(&store).await.unwrap(), 0);
        assert!(LogStore::read(&store, LogQuery::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_write_and_batch() {
        let store = InMemoryLogStore::new();
        LogStore::write(&store, log_at("Log 1", 1.0)).await.unwrap();
        store
            .write_batch(vec![log_at("Log 2", 2.0), log_at("Log 3", 3.0)])
            .await
            .unwrap();

        assert_eq!(LogStore::count(&store).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_read_is_ascending_regardless_of_write_order() {
        let store = InMemoryLogStore::new();
        for ts in [5.0, 1.0, 4.0, 2.0, 3.0] {
            LogStore::write(&store, log_at(&format!("at {ts}"), ts)).await.unwrap();
        }

        let timestamps: Vec<f64> = LogStore::read(&store, LogQuery::new())
            .await
            .unwrap()
            .iter()
            .map(|e| e.timestamp)
            .collect();

        assert_eq!(timestamps, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[tokio::test]
    async fn test_read_since_is_strict() {
        let store = InMemoryLogStore::new();
        LogStore::write(&store, log_at("at s", 100.0)).await.unwrap();
        LogStore::write(&store, log_at("after s", 100.001)).await.unwrap();

        let logs = LogStore::read(&store, LogQuery::new().since(100.0)).await.unwrap();

        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].message, "after s");
    }

    #[tokio::test]
    async fn test_read_filters_by_level() {
        let store = InMemoryLogStore::new();
        LogStore::write(&store, LogEntry::info("a").with_timestamp(1.0)).await.unwrap();
        LogStore::write(&store, LogEntry::error("b").with_timestamp(2.0)).await.unwrap();
        LogStore::write(&store, LogEntry::error("c").with_timestamp(3.0)).await.unwrap();

        let query = LogQuery::new().with_level("error".parse().unwrap());
        let logs = LogStore::read(&store, query).await.unwrap();

        assert_eq!(logs.len(), 2);
        assert!(logs.iter().all(|e| e.level == LogLevel::Error));
    }

    #[tokio::test]
    async fn test_read_is_restartable() {
        let store = InMemoryLogStore::new();
        LogStore::write(&store, log_at("x", 1.0)).await.unwrap();

        let first = LogStore::read(&store, LogQuery::new()).await.unwrap();
        let second = LogStore::read(&store, LogQuery::new()).await.unwrap();

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_delete_before_is_exact_and_idempotent() {
        let store = InMemoryLogStore::new();
        for ts in [1.0, 2.0, 3.0, 4.0] {
            LogStore::write(&store, log_at("x", ts)).await.unwrap();
        }

        assert_eq!(LogStore::delete_before(&store, 3.0).await.unwrap(), 2);
        assert_eq!(LogStore::delete_before(&store, 3.0).await.unwrap(), 0);

        let remaining: Vec<f64> = LogStore::read(&store, LogQuery::new())
            .await
            .unwrap()
            .iter()
            .map(|e| e.timestamp)
            .collect();
        assert_eq!(remaining, vec![3.0, 4.0]);
    }

    #[tokio::test]
    async fn test_delete_oldest() {
        let store = InMemoryLogStore::new();
        for ts in [3.0, 1.0, 4.0, 2.0] {
            LogStore::write(&store, log_at("x", ts)).await.unwrap();
        }

        assert_eq!(LogStore::delete_oldest(&store, 2).await.unwrap(), 2);
        assert_eq!(LogStore::delete_oldest(&store, 10).await.unwrap(), 2);
        assert_eq!(LogStore::count(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = InMemoryLogStore::new();
        LogStore::write(&store, log_at("x", 1.0)).await.unwrap();
        LogStore::clear(&store).await.unwrap();
        LogStore::clear(&store).await.unwrap();

        assert_eq!(LogStore::count(&store).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_writers() {
        let store = InMemoryLogStore::new_shared();
        let mut handles = Vec::new();
        for task in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    let ts = f64::from(task * 100 + i);
                    LogStore::write(store.as_ref(), log_at("x", ts)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(LogStore::count(store.as_ref()).await.unwrap(), 400);
    }

    #[test]
    fn test_blocking_contract() {
        let store = InMemoryLogStore::new();
        BlockingLogStore::write(&store, log_at("b", 2.0)).unwrap();
        BlockingLogStore::write(&store, log_at("a", 1.0)).unwrap();

        let logs = BlockingLogStore::read(&store, LogQuery::new()).unwrap();
        assert_eq!(logs[0].message, "a");
        assert_eq!(BlockingLogStore::count(&store).unwrap(), 2);
    }
}
