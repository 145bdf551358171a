//! Background retention sweeps.
//!
//! A [`RetentionSweeper`] owns a list of stores, each with a
//! [`RetentionPolicy`]. Every interval it deletes records older than the
//! policy's age limit and then trims the oldest surplus beyond the count
//! limit.

use crate::config::{RetentionConfig, RetentionPolicy, DEFAULT_SWEEP_INTERVAL};
use crate::storage::{LogStore, MetricStore, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Shortest interval a sweeper will run at.
pub const MIN_SWEEP_INTERVAL: Duration = Duration::from_millis(1);

/// A store the sweeper prunes.
#[derive(Clone)]
pub enum SweepTarget {
    /// A log store.
    Logs(Arc<dyn LogStore>),
    /// A metric store.
    Metrics(Arc<dyn MetricStore>),
}

impl SweepTarget {
    async fn delete_before(&self, timestamp: f64) -> Result<u64, StorageError> {
        match self {
            Self::Logs(store) => store.delete_before(timestamp).await,
            Self::Metrics(store) => store.delete_before(timestamp).await,
        }
    }

    async fn count(&self) -> Result<u64, StorageError> {
        match self {
            Self::Logs(store) => store.count().await,
            Self::Metrics(store) => store.count().await,
        }
    }

    async fn delete_oldest(&self, count: u64) -> Result<u64, StorageError> {
        match self {
            Self::Logs(store) => store.delete_oldest(count).await,
            Self::Metrics(store) => store.delete_oldest(count).await,
        }
    }
}

struct Target {
    name: String,
    store: SweepTarget,
    policy: RetentionPolicy,
}

/// Result of sweeping one store once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Name the store was registered under.
    pub target: String,
    /// Records removed for exceeding the age limit.
    pub expired: u64,
    /// Records removed for exceeding the count limit.
    pub evicted: u64,
}

/// Periodically prunes stores according to their policies.
pub struct RetentionSweeper {
    targets: Vec<Target>,
    interval: Duration,
}

impl Default for RetentionSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_SWEEP_INTERVAL)
    }
}

impl RetentionSweeper {
    /// Creates a sweeper with no stores.
    ///
    /// Intervals shorter than [`MIN_SWEEP_INTERVAL`] are raised to it.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        if interval < MIN_SWEEP_INTERVAL {
            tracing::warn!(
                requested_ms = interval.as_secs_f64() * 1000.0,
                "Sweep interval too short, using the minimum"
            );
        }
        Self {
            targets: Vec::new(),
            interval: interval.max(MIN_SWEEP_INTERVAL),
        }
    }

    /// Creates a sweeper for a log store and a metric store.
    #[must_use]
    pub fn from_config(
        config: &RetentionConfig,
        logs: Arc<dyn LogStore>,
        metrics: Arc<dyn MetricStore>,
    ) -> Self {
        Self::new(config.interval)
            .with_logs("logs", logs, config.logs)
            .with_metrics("metrics", metrics, config.metrics)
    }

    /// Adds a log store.
    #[must_use]
    pub fn with_logs(
        self,
        name: impl Into<String>,
        store: Arc<dyn LogStore>,
        policy: RetentionPolicy,
    ) -> Self {
        self.with_target(name, SweepTarget::Logs(store), policy)
    }

    /// Adds a metric store.
    #[must_use]
    pub fn with_metrics(
        self,
        name: impl Into<String>,
        store: Arc<dyn MetricStore>,
        policy: RetentionPolicy,
    ) -> Self {
        self.with_target(name, SweepTarget::Metrics(store), policy)
    }

    /// Adds any store.
    #[must_use]
    pub fn with_target(
        mut self,
        name: impl Into<String>,
        store: SweepTarget,
        policy: RetentionPolicy,
    ) -> Self {
        self.targets.push(Target {
            name: name.into(),
            store,
            policy,
        });
        self
    }

    /// Time between sweeps.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweeps every store once.
    ///
    /// A store that fails is logged and skipped; the others are still swept.
    /// Returns a report for each store that was swept successfully.
    pub async fn sweep_once(&self) -> Vec<SweepReport> {
        let mut reports = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            match sweep(target).await {
                Ok(report) => {
                    if report.expired > 0 || report.evicted > 0 {
                        tracing::info!(
                            store = %report.target,
                            expired = report.expired,
                            evicted = report.evicted,
                            "Retention sweep removed records"
                        );
                    }
                    reports.push(report);
                }
                Err(e) => {
                    tracing::warn!(store = %target.name, error = %e, "Retention sweep failed");
                }
            }
        }
        reports
    }

    /// Spawns the sweep loop on the current tokio runtime.
    ///
    /// The first sweep runs immediately. The loop stops when the returned
    /// handle is shut down or dropped; a sweep in progress always completes.
    #[must_use]
    pub fn start(self) -> SweeperHandle {
        let (shutdown, mut stop) = oneshot::channel::<()>();
        let interval = self.interval;

        let task = tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs_f64(),
                targets = self.targets.len(),
                "Retention sweeper started"
            );
            let mut tick = tokio::time::interval(interval);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = tick.tick() => {}
                    _ = &mut stop => break,
                }
                self.sweep_once().await;
            }

            tracing::info!("Retention sweeper stopped");
        });

        SweeperHandle { shutdown, task }
    }
}

async fn sweep(target: &Target) -> Result<SweepReport, StorageError> {
    let cutoff = crate::now() - target.policy.max_age_seconds;
    let expired = target.store.delete_before(cutoff).await?;

    let remaining = target.store.count().await?;
    let evicted = if remaining > target.policy.max_count {
        target
            .store
            .delete_oldest(remaining - target.policy.max_count)
            .await?
    } else {
        0
    };

    Ok(SweepReport {
        target: target.name.clone(),
        expired,
        evicted,
    })
}

/// Handle to a running sweeper.
pub struct SweeperHandle {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stops the sweeper and waits for it to finish.
    pub async fn shutdown(self) {
        let Self { shutdown, task } = self;
        let _ = shutdown.send(());
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "Retention sweeper task ended abnormally");
        }
    }

    /// Returns true once the loop has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
