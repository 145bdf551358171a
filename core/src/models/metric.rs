//! Metric data model.
//!
//! Defines the `MetricSample` record: one raw measurement of a named series.
//! Stores keep every sample; collapsing samples into a "current value" per
//! series is left to consumers (see [`MetricSample::series_key`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use validator::Validate;

/// Label map attached to a metric sample.
pub type Labels = HashMap<String, String>;

/// A single metric measurement.
///
/// # Example
///
/// ```
/// use sightline_core::models::MetricSample;
///
/// let sample = MetricSample::counter("http_requests_total")
///     .with_label("method", "GET")
///     .with_label("status", "200");
///
/// assert_eq!(sample.value, 1.0);
/// assert!(sample.validate_sample().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct MetricSample {
    /// The metric name (e.g., "`http_requests_total`").
    #[validate(length(min = 1, message = "Metric name cannot be empty"))]
    pub name: String,

    /// Unix timestamp in seconds.
    pub timestamp: f64,

    /// The measured value.
    pub value: f64,

    /// Labels (dimensions) for the sample.
    #[serde(default)]
    pub labels: Labels,
}

/// Errors that can occur during metric validation.
#[derive(Debug, Error)]
pub enum MetricValidationError {
    /// The metric name is empty.
    #[error("Metric name cannot be empty")]
    EmptyName,

    /// Validation failed with details.
    #[error("Validation failed: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

impl MetricSample {
    /// Creates a new sample stamped with the current wall-clock time.
    #[must_use]
    pub fn new(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            timestamp: crate::now(),
            value,
            labels: HashMap::new(),
        }
    }

    /// Creates a counter increment of `1.0`.
    #[must_use]
    pub fn counter(name: impl Into<String>) -> Self {
        Self::new(name, 1.0)
    }

    /// Creates a gauge reading.
    #[must_use]
    pub fn gauge(name: impl Into<String>, value: f64) -> Self {
        Self::new(name, value)
    }

    /// Overrides the timestamp.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Adds a label to the sample.
    #[must_use]
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Merges a set of labels into the sample, overwriting existing keys.
    #[must_use]
    pub fn with_labels<I, K, V>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.labels
            .extend(labels.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Returns the identity of the series this sample belongs to: the name and
    /// the labels sorted by key.
    #[must_use]
    pub fn series_key(&self) -> (String, Vec<(String, String)>) {
        let mut labels: Vec<(String, String)> = self
            .labels
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        labels.sort();
        (self.name.clone(), labels)
    }

    /// Validates the sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the metric name is empty.
    pub fn validate_sample(&self) -> Result<(), MetricValidationError> {
        if self.name.is_empty() {
            return Err(MetricValidationError::EmptyName);
        }
        self.validate()?;
        Ok(())
    }
}
