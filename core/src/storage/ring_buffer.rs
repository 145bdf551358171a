//! Fixed-capacity stores that evict the oldest record first.
//!
//! The slot vector is allocated once at construction. A write into a full
//! buffer overwrites the slot under the head cursor, which always holds the
//! record that arrived first.

use crate::models::{LogEntry, MetricSample};
use async_trait::async_trait;
use std::num::NonZeroUsize;
use std::sync::RwLock;

use super::metric_store::select_samples;
use super::{
    remove_oldest, BlockingLogStore, BlockingMetricStore, LogQuery, LogStore, MetricStore,
    StorageError,
};

/// Circular buffer over a fixed arena of slots.
#[derive(Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Creates an empty buffer holding at most `capacity` items.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        let mut slots = Vec::with_capacity(capacity.get());
        slots.resize_with(capacity.get(), || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of items the buffer holds.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of live items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the buffer holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends an item, returning the evicted oldest item when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len == capacity {
            let evicted = self.slots[self.head].replace(item);
            self.head = (self.head + 1) % capacity;
            evicted
        } else {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(item);
            self.len += 1;
            None
        }
    }

    /// Iterates over live items in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |offset| self.slots[(self.head + offset) % capacity].as_ref())
    }

    /// Drops every item.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
        self.head = 0;
        self.len = 0;
    }

    /// Takes the live items out in arrival order, lets `edit` remove some of
    /// them, and writes the survivors back starting at slot zero. Returns the
    /// number of items removed.
    fn compact(&mut self, edit: impl FnOnce(&mut Vec<T>)) -> u64 {
        let capacity = self.capacity();
        let mut live: Vec<T> = (0..self.len)
            .filter_map(|offset| self.slots[(self.head + offset) % capacity].take())
            .collect();
        let before = live.len();
        edit(&mut live);
        let removed = before.saturating_sub(live.len());

        self.head = 0;
        self.len = live.len();
        for (slot, item) in self.slots.iter_mut().zip(live) {
            *slot = Some(item);
        }
        removed as u64
    }

    /// Removes items for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) -> u64 {
        self.compact(|live| live.retain(|item| keep(item)))
    }

    /// Removes the `count` oldest items by `timestamp`, arrival order breaking ties.
    pub fn remove_oldest(&mut self, count: u64, timestamp: impl Fn(&T) -> f64) -> u64 {
        self.compact(|live| {
            remove_oldest(live, count, timestamp);
        })
    }
}

/// Bounded log store.
///
/// Once `capacity` entries are held, each write evicts the entry that arrived
/// first. Memory stays bounded without relying on the retention sweeper.
#[derive(Debug)]
pub struct RingBufferLogStore {
    buffer: RwLock<RingBuffer<LogEntry>>,
}

impl RingBufferLogStore {
    /// Creates an empty store holding at most `capacity` entries.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: RwLock::new(RingBuffer::new(capacity)),
        }
    }

    /// Maximum number of entries held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.read().map_or(0, |buffer| buffer.capacity())
    }
}

impl BlockingLogStore for RingBufferLogStore {
    fn write(&self, entry: LogEntry) -> Result<(), StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer log store"))?;
        buffer.push(entry);
        Ok(())
    }

    fn read(&self, query: LogQuery) -> Result<Vec<LogEntry>, StorageError> {
        let buffer = self
            .buffer
            .read()
            .map_err(|_| StorageError::LockError("ring buffer log store"))?;
        Ok(query.select(buffer.iter()))
    }

    fn count(&self) -> Result<u64, StorageError> {
        let buffer = self
            .buffer
            .read()
            .map_err(|_| StorageError::LockError("ring buffer log store"))?;
        Ok(buffer.len() as u64)
    }

    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer log store"))?;
        Ok(buffer.retain(|entry| entry.timestamp >= timestamp))
    }

    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer log store"))?;
        Ok(buffer.remove_oldest(count, |entry| entry.timestamp))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer log store"))?;
        buffer.clear();
        Ok(())
    }
}

#[async_trait]
impl LogStore for RingBufferLogStore {
    async fn write(&self, entry: LogEntry) -> Result<(), StorageError> {
        BlockingLogStore::write(self, entry)
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

/// Bounded metric store. Same eviction rule as [`RingBufferLogStore`].
#[derive(Debug)]
pub struct RingBufferMetricStore {
    buffer: RwLock<RingBuffer<MetricSample>>,
}

impl RingBufferMetricStore {
    /// Creates an empty store holding at most `capacity` samples.
    #[must_use]
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: RwLock::new(RingBuffer::new(capacity)),
        }
    }

    /// Maximum number of samples held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buffer.read().map_or(0, |buffer| buffer.capacity())
    }
}

impl BlockingMetricStore for RingBufferMetricStore {
    fn write(&self, sample: MetricSample) -> Result<(), StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer metric store"))?;
        buffer.push(sample);
        Ok(())
    }

    fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError> {
        let buffer = self
            .buffer
            .read()
            .map_err(|_| StorageError::LockError("ring buffer metric store"))?;
        Ok(select_samples(buffer.iter(), since))
    }

    fn count(&self) -> Result<u64, StorageError> {
        let buffer = self
            .buffer
            .read()
            .map_err(|_| StorageError::LockError("ring buffer metric store"))?;
        Ok(buffer.len() as u64)
    }

    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer metric store"))?;
        Ok(buffer.retain(|sample| sample.timestamp >= timestamp))
    }

    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer metric store"))?;
        Ok(buffer.remove_oldest(count, |sample| sample.timestamp))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut buffer = self
            .buffer
            .write()
            .map_err(|_| StorageError::LockError("ring buffer metric store"))?;
        buffer.clear();
        Ok(())
    }
}

#[async_trait]
impl MetricStore for RingBufferMetricStore {
    async fn write(&self, sample: MetricSample) -> Result<(), StorageError> {
        BlockingMetricStore::write(self, sample)
    }

    async fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError> {
        BlockingMetricStore::read(self, since)
    }

    async fn count(&self) -> Result<u64, StorageError> {
        BlockingMetricStore::count(self)
    }

    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        BlockingMetricStore::delete_before(self, timestamp)
    }

    async fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        BlockingMetricStore::delete_oldest(self, count)
    }

    async fn clear(&self) -> Result<(), StorageError> {
        BlockingMetricStore::clear(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LogLevel;

    fn capacity(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_push_evicts_oldest_when_full() {
        let mut ring = RingBuffer::new(capacity(3));
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.push(5), Some(2));

        assert_eq!(ring.len(), 3);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_retain_compacts_in_arrival_order() {
        let mut ring = RingBuffer::new(capacity(4));
        for value in 1..=6 {
            ring.push(value);
        }

        let removed = ring.retain(|v| v % 2 == 0);

        assert_eq!(removed, 2);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![4, 6]);
        assert_eq!(ring.capacity(), 4);

        ring.push(7);
        ring.push(8);
        ring.push(9);
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![6, 7, 8, 9]);
    }

    #[tokio::test]
    async fn test_last_n_records_survive_in_arrival_order() {
        let store = RingBufferLogStore::new(capacity(5));
        for i in 0..12 {
            LogStore::write(
                &store,
                LogEntry::info(format!("msg {i}")).with_timestamp(f64::from(i)),
            )
            .await
            .unwrap();
        }

        let logs = LogStore::read(&store, LogQuery::new().since(-1.0)).await.unwrap();
        let messages: Vec<&str> = logs.iter().map(|e| e.message.as_str()).collect();

        assert_eq!(LogStore::count(&store).await.unwrap(), 5);
        assert_eq!(messages, vec!["msg 7", "msg 8", "msg 9", "msg 10", "msg 11"]);
    }

    #[tokio::test]
    async fn test_read_is_sorted_and_filtered_over_current_contents() {
        let store = RingBufferLogStore::new(capacity(3));
        for (ts, level) in [
            (4.0, LogLevel::Error),
            (1.0, LogLevel::Info),
            (3.0, LogLevel::Error),
            (2.0, LogLevel::Error),
        ] {
            LogStore::write(&store, LogEntry::new(level, "x").with_timestamp(ts))
                .await
                .unwrap();
        }

        let errors = LogStore::read(&store, LogQuery::new().with_level(LogLevel::Error))
            .await
            .unwrap();
        let timestamps: Vec<f64> = errors.iter().map(|e| e.timestamp).collect();

        assert_eq!(timestamps, vec![2.0, 3.0]);
    }

    #[tokio::test]
    async fn test_deletes_keep_capacity() {
        let store = RingBufferMetricStore::new(capacity(4));
        for ts in [1.0, 2.0, 3.0, 4.0] {
            MetricStore::write(&store, MetricSample::gauge("g", ts).with_timestamp(ts))
                .await
                .unwrap();
        }

        assert_eq!(MetricStore::delete_before(&store, 2.0).await.unwrap(), 1);
        assert_eq!(MetricStore::delete_before(&store, 2.0).await.unwrap(), 0);
        assert_eq!(MetricStore::delete_oldest(&store, 1).await.unwrap(), 1);
        assert_eq!(MetricStore::count(&store).await.unwrap(), 2);
        assert_eq!(store.capacity(), 4);

        MetricStore::clear(&store).await.unwrap();
        assert!(MetricStore::scrape(&store).await.unwrap().is_empty());
    }

    #[test]
    fn test_blocking_mode_on_ring_store() {
        let store = RingBufferMetricStore::new(capacity(2));
        for ts in [1.0, 2.0, 3.0] {
            BlockingMetricStore::write(&store, MetricSample::counter("c").with_timestamp(ts)).unwrap();
        }

        let timestamps: Vec<f64> = BlockingMetricStore::scrape(&store)
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(timestamps, vec![2.0, 3.0]);
    }
}
