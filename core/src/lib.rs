//! Sightline core library
//!
//! Captures structured log entries and metric samples produced while serving
//! requests, stores them in a pluggable time-ordered backend, and reads them
//! back filtered.
//!
//! # Modules
//!
//! - [`models`] - Log entry and metric sample records
//! - [`storage`] - Storage traits and the in-memory, ring buffer, and SQLite backends
//! - [`retention`] - Background sweeper enforcing age and count limits
//! - [`context`] - Per-request correlation context
//! - [`middleware`] - Request instrumentation
//! - [`query`] - Read-boundary parameter parsing
//! - [`config`] - Retention policies
//!
//! # Example
//!
//! ```
//! use sightline_core::models::{LogEntry, LogLevel};
//! use sightline_core::storage::{BlockingLogStore, InMemoryLogStore, LogQuery};
//!
//! let store = InMemoryLogStore::new();
//! store
//!     .write(LogEntry::new(LogLevel::Info, "User logged in").with_attribute("user_id", "12345"))
//!     .unwrap();
//!
//! let logs = store.read(LogQuery::new().with_level(LogLevel::Info)).unwrap();
//! assert_eq!(logs.len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod context;
pub mod middleware;
pub mod models;
pub mod query;
pub mod retention;
pub mod storage;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use serde;
pub use serde_json;
pub use validator;

/// Current wall-clock time as Unix seconds.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn now() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
