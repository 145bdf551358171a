//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::{Config, StorageKind};
use sightline_core::middleware::{InstrumentationMiddleware, MiddlewareConfig};
use sightline_core::storage::{
    InMemoryLogStore, InMemoryMetricStore, LogStore, MetricStore, RingBufferLogStore,
    RingBufferMetricStore, SqliteLocation, SqliteLogStore, SqliteMetricStore,
};
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// Holds the storage backends and the instrumentation middleware writing into
/// them.
#[derive(Clone)]
pub struct AppState {
    /// The log storage backend.
    log_store: Arc<dyn LogStore>,
    /// The metric storage backend.
    metric_store: Arc<dyn MetricStore>,
    /// Records every request into the stores above.
    middleware: Arc<InstrumentationMiddleware>,
}

impl AppState {
    /// Creates a new application state with the given stores.
    pub fn new(
        log_store: Arc<dyn LogStore>,
        metric_store: Arc<dyn MetricStore>,
        config: MiddlewareConfig,
    ) -> Self {
        let middleware = Arc::new(
            InstrumentationMiddleware::new(log_store.clone(), metric_store.clone())
                .with_config(config),
        );
        Self {
            log_store,
            metric_store,
            middleware,
        }
    }

    /// Creates a new application state with in-memory stores and the default
    /// server exclusions.
    ///
    /// This is useful for development and testing.
    #[must_use]
    pub fn with_in_memory_store() -> Self {
        Self::new(
            InMemoryLogStore::new_shared(),
            InMemoryMetricStore::new_shared(),
            Config::default().middleware,
        )
    }

    /// Creates the stores selected by `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let (log_store, metric_store): (Arc<dyn LogStore>, Arc<dyn MetricStore>) =
            match config.storage {
                StorageKind::Memory => (
                    InMemoryLogStore::new_shared() as Arc<dyn LogStore>,
                    InMemoryMetricStore::new_shared() as Arc<dyn MetricStore>,
                ),
                StorageKind::Ring => (
                    Arc::new(RingBufferLogStore::new(config.ring_capacity)) as Arc<dyn LogStore>,
                    Arc::new(RingBufferMetricStore::new(config.ring_capacity))
                        as Arc<dyn MetricStore>,
                ),
                StorageKind::Sqlite => {
                    let location = SqliteLocation::parse(&config.db_path);
                    (
                        Arc::new(SqliteLogStore::new(location.clone())) as Arc<dyn LogStore>,
                        Arc::new(SqliteMetricStore::new(location)) as Arc<dyn MetricStore>,
                    )
                }
            };

        tracing::info!(
            storage = %config.storage,
            db_path = %config.db_path,
            ring_capacity = config.ring_capacity.get(),
            "Storage backend selected"
        );

        Self::new(log_store, metric_store, config.middleware.clone())
    }

    /// Returns a reference to the log store.
    #[must_use]
    pub fn log_store(&self) -> &dyn LogStore {
        self.log_store.as_ref()
    }

    /// Returns a reference to the metric store.
    #[must_use]
    pub fn metric_store(&self) -> &dyn MetricStore {
        self.metric_store.as_ref()
    }

    /// Returns a shared handle to the log store.
    #[must_use]
    pub fn shared_log_store(&self) -> Arc<dyn LogStore> {
        self.log_store.clone()
    }

    /// Returns a shared handle to the metric store.
    #[must_use]
    pub fn shared_metric_store(&self) -> Arc<dyn MetricStore> {
        self.metric_store.clone()
    }

    /// Returns the request instrumentation middleware.
    #[must_use]
    pub fn middleware(&self) -> &InstrumentationMiddleware {
        &self.middleware
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::with_in_memory_store()
    }
}
