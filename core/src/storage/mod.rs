//! Storage traits and implementations.
//!
//! This module provides the storage contract for captured logs and metrics and
//! three families of backends:
//!
//! - [`InMemoryLogStore`] / [`InMemoryMetricStore`]: unbounded volatile lists.
//! - [`RingBufferLogStore`] / [`RingBufferMetricStore`]: fixed capacity,
//!   oldest record evicted first.
//! - [`sqlite`]: durable SQLite storage with a non-blocking and a blocking
//!   access mode.

mod error;
pub mod log_store;
pub mod metric_store;
pub mod ring_buffer;
pub mod sqlite;

pub use error::StorageError;
pub use log_store::{BlockingLogStore, InMemoryLogStore, LogQuery, LogStore};
pub use metric_store::{BlockingMetricStore, InMemoryMetricStore, MetricStore};
pub use ring_buffer::{RingBufferLogStore, RingBufferMetricStore};
pub use sqlite::{
    BlockingSqliteLogStore, BlockingSqliteMetricStore, SqliteLocation, SqliteLogStore,
    SqliteMetricStore,
};

/// Removes the `count` oldest records from `items`, where age is given by
/// `timestamp` and position breaks ties. Returns the number removed.
pub(crate) fn remove_oldest<T>(items: &mut Vec<T>, count: u64, timestamp: impl Fn(&T) -> f64) -> u64 {
    let count = usize::try_from(count).unwrap_or(usize::MAX).min(items.len());
    if count == 0 {
        return 0;
    }
    if count == items.len() {
        items.clear();
        return count as u64;
    }

    let mut order: Vec<usize> = (0..items.len()).collect();
    order.sort_by(|&a, &b| timestamp(&items[a]).total_cmp(&timestamp(&items[b])));

    let mut doomed = vec![false; items.len()];
    for &index in &order[..count] {
        doomed[index] = true;
    }

    let mut position = 0;
    items.retain(|_| {
        let keep = !doomed[position];
        position += 1;
        keep
    });
    count as u64
}
