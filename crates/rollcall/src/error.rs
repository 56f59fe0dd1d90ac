//! Error types for the identity service.

use rollcall_core::{CoreError, StateError};
use rollcall_perms::PermsError;
use rollcall_store::StoreError;
use thiserror::Error;

/// Errors that can occur during identity operations.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// Bad credentials. Never says whether the username exists.
    #[error("invalid username or password")]
    Authentication,

    /// No live session, or nobody left to act as.
    #[error("not authenticated")]
    Unauthenticated,

    /// The caller lacks the capability the operation requires.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Invalid identity transition.
    #[error("{0}")]
    State(#[from] StateError),

    /// The named principal does not exist or is inactive.
    #[error("principal not found: {0}")]
    NotFound(String),

    /// A credential already uses this username.
    #[error("username already taken: {0}")]
    UsernameTaken(String),

    /// Invalid provisioning input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Role table or capability configuration rejected.
    #[error("permission configuration error: {0}")]
    Permissions(#[from] PermsError),

    /// Credential hashing failed.
    #[error("credential error: {0}")]
    Credential(#[from] CoreError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

/// An audit event could not be persisted.
///
/// Never returned from an identity operation; the audit tracker logs it and
/// moves on.
#[derive(Debug, Error)]
#[error("audit write failed: {0}")]
pub struct AuditWriteError(#[from] pub StoreError);

/// Result type for identity operations.
pub type Result<T> = std::result::Result<T, IdentityError>;
