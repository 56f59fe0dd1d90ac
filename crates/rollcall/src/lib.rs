//! # Rollcall Identity
//!
//! Session identity management with administrative impersonation.
//!
//! ## Overview
//!
//! Every session is in one of two states:
//!
//! - **Normal**: acting as the principal that logged in
//! - **Impersonating**: an elevated principal acting as someone else, with
//!   the way back recorded in the session itself
//!
//! [`IdentityService`] owns every transition between them and is the only
//! place the rest of the application asks "who is acting now, and what may
//! they do".
//!
//! ## Components
//!
//! - **Authentication gate**: [`IdentityService::login`], [`IdentityService::logout`]
//! - **Impersonation controller**: [`IdentityService::start_impersonation`],
//!   [`IdentityService::stop_impersonation`]
//! - **Identity read endpoint**: [`IdentityService::current_identity`],
//!   [`IdentityService::has_permission`]
//! - **Role switch**: [`IdentityService::switch_role`]
//! - **Audit tracker**: [`AuditTracker`], best-effort and never blocking
//! - **Client identity cache**: [`IdentityCache`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rollcall::{IdentityConfig, IdentityService};
//! use rollcall::core::{Principal, PrincipalId, Role};
//! use rollcall::store::SqliteStore;
//!
//! async fn example() {
//!     let store = SqliteStore::open("identity.db").unwrap();
//!     let service = IdentityService::new(store, IdentityConfig::default()).unwrap();
//!
//!     let admin = Principal::new(PrincipalId(1), "Ada Admin", Role::from("super_admin"));
//!     service.provision("ada", "correct horse", admin).await.unwrap();
//!
//!     let session = service.login("ada", "correct horse", None).await.unwrap();
//!     let imp = service
//!         .start_impersonation(&session.token, PrincipalId(42))
//!         .await
//!         .unwrap();
//!     assert_eq!(imp.original.principal.id, PrincipalId(1));
//!
//!     service.stop_impersonation(&session.token).await.unwrap();
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `rollcall::core` - principals, session state, audit events
//! - `rollcall::perms` - permission catalogue and resolver
//! - `rollcall::store` - storage traits, SQLite and in-memory stores

pub mod audit;
pub mod cache;
pub mod config;
pub mod error;
mod gate;
mod identity;
mod impersonation;
mod role;
pub mod service;

// Re-export component crates
pub use rollcall_core as core;
pub use rollcall_perms as perms;
pub use rollcall_store as store;

// Re-export main types for convenience
pub use audit::AuditTracker;
pub use cache::{IdentityCache, IdentitySource};
pub use config::IdentityConfig;
pub use error::{AuditWriteError, IdentityError, Result};
pub use service::{
    CurrentIdentity, Impersonation, IdentityService, IdentityStore, LoginOutcome,
    ResolvedPrincipal,
};

pub use rollcall_core::{
    Principal, PrincipalId, Role, SessionIdentityState, SessionToken, StateError,
};
pub use rollcall_perms::PermissionSet;
