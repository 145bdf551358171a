//! Metric storage traits and the volatile in-memory implementation.
//!
//! Metric stores keep every sample they are given. A read returns the raw
//! sample sequence, never a deduplicated "current value" per series.

use crate::models::MetricSample;
use async_trait::async_trait;
use std::sync::{Arc, RwLock};

use super::{remove_oldest, StorageError};

/// Filters and orders samples for a read: timestamp strictly greater than
/// `since`, ascending, ties kept in arrival order.
pub(crate) fn select_samples<'a>(
    samples: impl IntoIterator<Item = &'a MetricSample>,
    since: f64,
) -> Vec<MetricSample> {
    let mut selected: Vec<MetricSample> = samples
        .into_iter()
        .filter(|sample| sample.timestamp > since)
        .cloned()
        .collect();
    selected.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    selected
}

/// Non-blocking metric storage.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Appends a single sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist the sample.
    async fn write(&self, sample: MetricSample) -> Result<(), StorageError>;

    /// Appends several samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist any sample.
    async fn write_batch(&self, samples: Vec<MetricSample>) -> Result<(), StorageError> {
        for sample in samples {
            self.write(sample).await?;
        }
        Ok(())
    }

    /// Reads samples with a timestamp strictly greater than `since`, ascending
    /// by timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    async fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError>;

    /// Returns every accumulated sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    async fn scrape(&self) -> Result<Vec<MetricSample>, StorageError> {
        self.read(0.0).await
    }

    /// Returns the total number of samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    async fn count(&self) -> Result<u64, StorageError>;

    /// Deletes samples with a timestamp strictly less than `timestamp` and
    /// returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError>;

    /// Deletes the `count` oldest samples and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    async fn delete_oldest(&self, count: u64) -> Result<u64, StorageError>;

    /// Removes every sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    async fn clear(&self) -> Result<(), StorageError>;
}

/// Blocking mirror of [`MetricStore`] for synchronous callers.
pub trait BlockingMetricStore: Send + Sync {
    /// Appends a single sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to persist the sample.
    fn write(&self, sample: MetricSample) -> Result<(), StorageError>;

    /// Reads samples newer than `since`, ascending by timestamp.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError>;

    /// Returns every accumulated sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the read operation fails.
    fn scrape(&self) -> Result<Vec<MetricSample>, StorageError> {
        self.read(0.0)
    }

    /// Returns the total number of samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the count operation fails.
    fn count(&self) -> Result<u64, StorageError>;

    /// Deletes samples with a timestamp strictly less than `timestamp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError>;

    /// Deletes the `count` oldest samples.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete operation fails.
    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError>;

    /// Removes every sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails.
    fn clear(&self) -> Result<(), StorageError>;
}

/// In-memory metric store implementation.
///
/// **Note:** Data is not persisted across restarts.
#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    samples: Arc<RwLock<Vec<MetricSample>>>,
}

impl InMemoryMetricStore {
    /// Creates a new empty in-memory metric store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            samples: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Creates a new in-memory metric store wrapped in an Arc.
    #[must_use]
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl BlockingMetricStore for InMemoryMetricStore {
    fn write(&self, sample: MetricSample) -> Result<(), StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::LockError("metric store"))?;
        samples.push(sample);
        Ok(())
    }

    fn read(&self, since: f64) -> Result<Vec<MetricSample>, StorageError> {
        let samples = self
            .samples
            .read()
            .map_err(|_| StorageError::LockError("metric store"))?;
        Ok(select_samples(samples.iter(), since))
    }

    fn count(&self) -> Result<u64, StorageError> {
        let samples = self
            .samples
            .read()
            .map_err(|_| StorageError::LockError("metric store"))?;
        Ok(samples.len() as u64)
    }

    fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::LockError("metric store"))?;
        let before = samples.len();
        samples.retain(|sample| sample.timestamp >= timestamp);
        Ok((before - samples.len()) as u64)
    }

    fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::LockError("metric store"))?;
        Ok(remove_oldest(&mut samples, count, |sample| sample.timestamp))
    }

    fn clear(&self) -> Result<(), StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::LockError("metric store"))?;
        samples.clear();
        Ok(())
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn write(&self, sample: MetricSample) -> Result<(), StorageError> {
        BlockingMetricStore::write(self, sample)
    }

    async fn write_batch(&self, new_samples: Vec<MetricSample>) -> Result<(), StorageError> {
        let mut samples = self
            .samples
            .write()
            .map_err(|_| StorageError::LockError("metric store"))?;
        samples.extend(new_samples);
        Ok(())
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

    fn sample_at(name: &str, value: f64, timestamp: f64) -> MetricSample {
        MetricSample::gauge(name, value).with_timestamp(timestamp)
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryMetricStore::new();
        assert_eq!(MetricStore::count(&store).await.unwrap(), 0);
        assert!(MetricStore::scrape(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scrape_returns_every_sample_of_a_series() {
        let store = InMemoryMetricStore::new();
        MetricStore::write(&store, sample_at("temp", 20.0, 1.0)).await.unwrap();
        MetricStore::write(&store, sample_at("temp", 21.0, 2.0)).await.unwrap();
        MetricStore::write(&store, sample_at("temp", 22.0, 3.0)).await.unwrap();

        let samples = MetricStore::scrape(&store).await.unwrap();

        assert_eq!(samples.len(), 3);
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        assert_eq!(values, vec![20.0, 21.0, 22.0]);
    }

    #[tokio::test]
    async fn test_read_since_is_strict_and_ascending() {
        let store = InMemoryMetricStore::new();
        store
            .write_batch(vec![
                sample_at("a", 1.0, 30.0),
                sample_at("a", 1.0, 10.0),
                sample_at("a", 1.0, 20.0),
            ])
            .await
            .unwrap();

        let timestamps: Vec<f64> = MetricStore::read(&store, 10.0)
            .await
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();

        assert_eq!(timestamps, vec![20.0, 30.0]);
    }

    #[tokio::test]
    async fn test_delete_before_is_idempotent() {
        let store = InMemoryMetricStore::new();
        for ts in [1.0, 2.0, 3.0] {
            MetricStore::write(&store, sample_at("a", 0.0, ts)).await.unwrap();
        }

        assert_eq!(MetricStore::delete_before(&store, 2.5).await.unwrap(), 2);
        assert_eq!(MetricStore::delete_before(&store, 2.5).await.unwrap(), 0);
        assert_eq!(MetricStore::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_oldest_and_clear() {
        let store = InMemoryMetricStore::new();
        for ts in [5.0, 4.0, 3.0] {
            MetricStore::write(&store, sample_at("a", ts, ts)).await.unwrap();
        }

        assert_eq!(MetricStore::delete_oldest(&store, 1).await.unwrap(), 1);
        let remaining: Vec<f64> = MetricStore::scrape(&store)
            .await
            .unwrap()
            .iter()
            .map(|s| s.timestamp)
            .collect();
        assert_eq!(remaining, vec![4.0, 5.0]);

        MetricStore::clear(&store).await.unwrap();
        assert_eq!(MetricStore::count(&store).await.unwrap(), 0);
    }
}
