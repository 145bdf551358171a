//! Storage error type shared by every backend.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to acquire a lock on the store (a writer panicked while holding it).
    #[error("Failed to acquire lock on {0}")]
    LockError(&'static str),

    /// The database reported an error.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Attributes or labels could not be encoded for storage.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The runtime driving blocking database access could not be created.
    #[error("Runtime error: {0}")]
    Runtime(#[from] std::io::Error),

    /// Generic storage error.
    #[error("Storage error: {0}")]
    StorageError(String),
}
