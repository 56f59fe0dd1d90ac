//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Value serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Username already registered.
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// Principal id already registered.
    #[error("principal already exists: {0}")]
    DuplicatePrincipal(u64),

    /// Session token already in use.
    #[error("session already exists")]
    DuplicateSession,

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Lock poisoned or blocking task failed.
    #[error("storage task failed: {0}")]
    Task(String),

    /// The backing store refused the write.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
