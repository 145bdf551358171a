//! Request instrumentation.
//!
//! [`InstrumentationMiddleware`] wraps a downstream [`Handler`]. For every
//! HTTP work item it establishes a [`RequestContext`] carrying the correlation
//! id, observes the response signals without altering them, and afterwards
//! writes one log entry and two metric samples describing the exchange.

use crate::context::{ContextGuard, RequestContext};
use crate::models::{LogEntry, LogLevel, MetricSample};
use crate::storage::{LogStore, MetricStore, StorageError};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use http::HeaderMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use super::config::MiddlewareConfig;
use super::exchange::{Handler, HandlerError, Signal, SignalSink, WorkItem};

/// Records every handled request into a log store and a metric store.
///
/// The configuration can be replaced while requests are in flight; each
/// request uses the configuration current when it started.
pub struct InstrumentationMiddleware {
    logs: Arc<dyn LogStore>,
    metrics: Arc<dyn MetricStore>,
    config: ArcSwap<MiddlewareConfig>,
}

impl InstrumentationMiddleware {
    /// Creates a middleware with the default configuration.
    #[must_use]
    pub fn new(logs: Arc<dyn LogStore>, metrics: Arc<dyn MetricStore>) -> Self {
        Self {
            logs,
            metrics,
            config: ArcSwap::from_pointee(MiddlewareConfig::default()),
        }
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(self, config: MiddlewareConfig) -> Self {
        self.config.store(Arc::new(config));
        self
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> Arc<MiddlewareConfig> {
        self.config.load_full()
    }

    /// Swaps in a new configuration.
    pub fn set_config(&self, config: MiddlewareConfig) {
        self.config.store(Arc::new(config));
    }

    /// Edits the configuration in place.
    pub fn update_config(&self, mut edit: impl FnMut(&mut MiddlewareConfig)) {
        self.config.rcu(|current| {
            let mut next = MiddlewareConfig::clone(current);
            edit(&mut next);
            next
        });
    }

    /// Wraps `inner` so it can be used wherever a [`Handler`] is expected.
    #[must_use]
    pub fn wrap<H: Handler>(self: Arc<Self>, inner: H) -> Instrumented<H> {
        Instrumented {
            middleware: self,
            inner,
        }
    }

    /// Handles one work item through `next`.
    ///
    /// Control items go straight to `next`. HTTP requests are recorded unless
    /// their path is excluded.
    ///
    /// # Errors
    ///
    /// Returns the handler's error unchanged. Store failures are logged and
    /// never change the outcome.
    pub async fn handle(
        &self,
        item: WorkItem,
        sink: &mut dyn SignalSink,
        next: &dyn Handler,
    ) -> Result<(), HandlerError> {
        let WorkItem::Http(request) = &item else {
            return next.handle(item, sink).await;
        };

        let config = self.config.load_full();
        let method = request.method.as_str().to_string();
        let path = request.path.clone();
        let request_id = extract_request_id(&request.headers, &config.request_id_header);

        let initial = [("request_id".to_string(), request_id.as_str().into())];
        RequestContext::scope(initial, async move {
            let _guard = ContextGuard::new();
            let start = Instant::now();

            let mut observer = ObservingSink::new(sink);
            let outcome = next.handle(item, &mut observer).await;
            let elapsed = start.elapsed();

            if config.is_excluded(&path) {
                return outcome;
            }

            let record = RequestRecord {
                status: observer.status.unwrap_or(500),
                body_size: observer.body_size,
                exception: outcome.as_ref().err().map(HandlerError::describe),
                request_id,
                method,
                path,
                elapsed,
            };

            if let Err(storage) = self.record_with_timeout(&config, &record).await {
                tracing::error!(
                    request_id = %record.request_id,
                    path = %record.path,
                    status = record.status,
                    error = %storage,
                    "Failed to record request"
                );
            }
            outcome
        })
        .await
    }

    async fn record_with_timeout(
        &self,
        config: &MiddlewareConfig,
        record: &RequestRecord,
    ) -> Result<(), StorageError> {
        let Some(limit) = config.write_timeout else {
            return self.record(config, record).await;
        };

        if let Ok(result) = tokio::time::timeout(limit, self.record(config, record)).await {
            result
        } else {
            tracing::warn!(
                request_id = %record.request_id,
                path = %record.path,
                timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                "Recording request timed out, writes abandoned"
            );
            Ok(())
        }
    }

    async fn record(
        &self,
        config: &MiddlewareConfig,
        record: &RequestRecord,
    ) -> Result<(), StorageError> {
        if config.log_requests {
            self.logs.write(record.log_entry()).await?;
        }
        if config.record_metrics {
            self.metrics.write_batch(record.samples(config)).await?;
        }
        Ok(())
    }
}

/// A handler wrapped by [`InstrumentationMiddleware`].
pub struct Instrumented<H> {
    middleware: Arc<InstrumentationMiddleware>,
    inner: H,
}

impl<H> Instrumented<H> {
    /// The middleware doing the recording.
    #[must_use]
    pub fn middleware(&self) -> &Arc<InstrumentationMiddleware> {
        &self.middleware
    }
}

#[async_trait]
impl<H: Handler> Handler for Instrumented<H> {
    async fn handle(&self, item: WorkItem, sink: &mut dyn SignalSink) -> Result<(), HandlerError> {
        self.middleware.handle(item, sink, &self.inner).await
    }
}

fn extract_request_id(headers: &HeaderMap, header: &str) -> String {
    let name = header.to_ascii_lowercase();
    headers
        .get(name.as_str())
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map_or_else(|| Uuid::new_v4().to_string(), str::to_string)
}

/// Forwards every signal while noting the status and body size.
struct ObservingSink<'a> {
    inner: &'a mut dyn SignalSink,
    status: Option<u16>,
    body_size: u64,
}

impl<'a> ObservingSink<'a> {
    fn new(inner: &'a mut dyn SignalSink) -> Self {
        Self {
            inner,
            status: None,
            body_size: 0,
        }
    }
}

#[async_trait]
impl<'a> SignalSink for ObservingSink<'a> {
    async fn send(&mut self, signal: Signal) -> Result<(), HandlerError> {
        match &signal {
            Signal::Start { status, .. } => {
                self.status.get_or_insert(*status);
            }
            Signal::Body { chunk, .. } => {
                self.body_size += chunk.len() as u64;
            }
        }
        self.inner.send(signal).await
    }
}

/// What the middleware learned about one exchange.
struct RequestRecord {
    request_id: String,
    method: String,
    path: String,
    status: u16,
    body_size: u64,
    elapsed: Duration,
    exception: Option<String>,
}

impl RequestRecord {
    fn log_entry(&self) -> LogEntry {
        let entry = LogEntry::new(
            LogLevel::from_status(self.status),
            format!("{} {}", self.method, self.path),
        )
        .with_attribute("request_id", self.request_id.as_str())
        .with_attribute("method", self.method.as_str())
        .with_attribute("path", self.path.as_str())
        .with_attribute("status_code", self.status)
        .with_attribute("response_body_size", self.body_size)
        .with_attribute("duration_ms", self.elapsed.as_secs_f64() * 1000.0);

        let entry = match &self.exception {
            Some(exception) => entry.with_attribute("exception", exception.as_str()),
            None => entry,
        };
        entry.with_context()
    }

    fn samples(&self, config: &MiddlewareConfig) -> Vec<MetricSample> {
        vec![
            MetricSample::counter(config.request_counter_name.as_str())
                .with_label("method", self.method.as_str())
                .with_label("path", self.path.as_str())
                .with_label("status", self.status.to_string()),
            MetricSample::new(
                config.request_histogram_name.as_str(),
                self.elapsed.as_secs_f64(),
            )
            .with_label("method", self.method.as_str())
            .with_label("path", self.path.as_str()),
        ]
    }
}
