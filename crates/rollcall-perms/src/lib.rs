//! # Rollcall Permissions
//!
//! Role → permission resolution.
//!
//! ## Overview
//!
//! A principal's permissions are never stored. They are derived, on every
//! identity resolution, from the principal's current role (and, for
//! facility-scoped roles, its facility associations) by one pure function:
//! [`PermissionResolver::resolve`].
//!
//! ## Fail-closed
//!
//! Unknown or malformed roles resolve to a [`PermissionSet`] that grants
//! nothing. A bad role assignment can therefore never widen access; it can
//! only lock the principal out.
//!
//! ## Usage
//!
//! ```rust
//! use rollcall_core::Role;
//! use rollcall_perms::{names, PermissionResolver};
//!
//! let resolver = PermissionResolver::with_builtin_roles();
//! let perms = resolver.resolve(&Role::from("super_admin"), None);
//! assert!(perms.grants(names::USERS_IMPERSONATE));
//!
//! let nothing = resolver.resolve(&Role::from("no-such-role"), None);
//! assert!(nothing.grants_nothing());
//! ```

pub mod catalogue;
pub mod error;
pub mod resolver;
pub mod template;

pub use catalogue::{is_known_permission, names, CATALOGUE};
pub use error::{PermsError, Result};
pub use resolver::{FacilityContext, PermissionResolver, PermissionSet};
pub use template::{RoleScope, RoleTemplate};
