//! Error types for Rollcall Core.

use thiserror::Error;

/// Core errors that can occur while building or decoding identity types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid session identity state: {0}")]
    InvalidSessionState(String),

    #[error("invalid session token")]
    InvalidToken,

    #[error("invalid principal id: {0}")]
    InvalidPrincipalId(String),

    #[error("password hashing failed: {0}")]
    PasswordHashing(String),

    #[error("invalid password hash: {0}")]
    InvalidPasswordHash(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
