//! Retention configuration for data expiration policies.
//!
//! A policy bounds a store by age and by record count. The sweeper in
//! [`crate::retention`] applies it periodically.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Default interval between retention sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

fn invalid(field: &'static str, code: &'static str) -> RetentionError {
    let mut errors = validator::ValidationErrors::new();
    errors.add(field, ValidationError::new(code));
    RetentionError::Invalid(errors)
}

/// Retention policy for one store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct RetentionPolicy {
    /// Records older than this many seconds are deleted.
    #[validate(range(exclusive_min = 0.0, message = "max_age_seconds must be positive"))]
    pub max_age_seconds: f64,

    /// At most this many records are kept; the oldest surplus is deleted.
    #[validate(range(min = 1, message = "max_count must be at least 1"))]
    pub max_count: u64,
}

/// Errors that can occur during retention policy validation.
#[derive(Debug, Error)]
pub enum RetentionError {
    /// Validation failed with details.
    #[error("Invalid retention policy: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl RetentionPolicy {
    /// Creates a new retention policy.
    ///
    /// # Examples
    ///
    /// ```
    /// use sightline_core::config::RetentionPolicy;
    ///
    /// let policy = RetentionPolicy::new(3600.0, 10_000);
    /// assert!(policy.validate_policy().is_ok());
    /// assert_eq!(policy.max_age().as_secs(), 3600);
    /// ```
    #[must_use]
    pub fn new(max_age_seconds: f64, max_count: u64) -> Self {
        Self {
            max_age_seconds,
            max_count,
        }
    }

    /// Returns the maximum age as a `Duration`, saturating on invalid input.
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::try_from_secs_f64(self.max_age_seconds).unwrap_or(Duration::MAX)
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `max_age_seconds` is zero, negative, NaN, or infinite
    /// - `max_count` is zero
    pub fn validate_policy(&self) -> Result<(), RetentionError> {
        self.validate()?;
        if !self.max_age_seconds.is_finite() {
            return Err(invalid("max_age_seconds", "max_age_seconds must be finite"));
        }
        Ok(())
    }
}

impl Default for RetentionPolicy {
    /// One day, one hundred thousand records.
    fn default() -> Self {
        Self::new(86_400.0, 100_000)
    }
}

/// Retention configuration for both record kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Retention policy for logs.
    pub logs: RetentionPolicy,
    /// Retention policy for metrics.
    pub metrics: RetentionPolicy,
    /// Time between sweeps.
    pub interval: Duration,
}

impl RetentionConfig {
    /// Validates both policies and the interval.
    ///
    /// # Errors
    ///
    /// Returns an error if either policy is invalid.
    pub fn validate(&self) -> Result<(), RetentionError> {
        self.logs.validate_policy()?;
        self.metrics.validate_policy()?;
        if self.interval.is_zero() {
            return Err(invalid("interval", "interval must be non-zero"));
        }
        Ok(())
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            logs: RetentionPolicy::default(),
            metrics: RetentionPolicy::default(),
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }
}
