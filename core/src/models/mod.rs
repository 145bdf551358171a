//! Record types captured by Sightline.
//!
//! This module contains the immutable value objects written to the stores:
//! log entries and metric samples.

pub mod log;
pub mod metric;

pub use log::{AttributeValue, Attributes, LogEntry, LogLevel, ParseLevelError};
pub use metric::{Labels, MetricSample, MetricValidationError};
