//! Configuration types shared by the library and the server.
//!
//! This module contains retention policies. Instrumentation settings live in
//! [`crate::middleware::MiddlewareConfig`].

pub mod retention;

pub use retention::{RetentionConfig, RetentionError, RetentionPolicy, DEFAULT_SWEEP_INTERVAL};
