//! Error types for the permissions module.

use thiserror::Error;

/// Errors that can occur while registering role templates.
///
/// Resolution itself never fails; see [`crate::PermissionResolver::resolve`].
#[derive(Debug, Error)]
pub enum PermsError {
    /// A template names a permission outside the catalogue.
    #[error("unknown permission: {0}")]
    UnknownPermission(String),

    /// A template's role name has no canonical form.
    #[error("malformed role name: {0:?}")]
    MalformedRole(String),

    /// A template with this name already exists.
    #[error("role already registered: {0}")]
    DuplicateRole(String),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
