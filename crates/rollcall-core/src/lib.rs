//! # Rollcall Core
//!
//! Pure types for Rollcall Identity: principals, the per-session identity
//! record, audit events, and Argon2id credential hashing.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`Principal`] - An immutable snapshot of an identity from the credential store
//! - [`SessionIdentityState`] - The {active, original, impersonating} record for one session
//! - [`SessionToken`] - The opaque value a client holds to name its session
//! - [`AuditEvent`] - An append-only record of an identity-affecting action
//! - [`PasswordHash`] - An Argon2id PHC credential hash
//!
//! ## Session Identity State
//!
//! A session is either **Normal** (acting as the logged-in principal) or
//! **Impersonating** (acting as a target while remembering the original).
//! The two transitions are [`SessionIdentityState::begin_impersonation`] and
//! [`SessionIdentityState::end_impersonation`]; the type cannot represent a
//! record whose original identity is set while it claims not to impersonate.

pub mod audit;
pub mod crypto;
pub mod error;
pub mod principal;
pub mod session;
pub mod types;

pub use audit::{AuditEvent, AuditKind};
pub use crypto::PasswordHash;
pub use error::{CoreError, Result};
pub use principal::{Principal, Role};
pub use session::{SessionIdentityState, StateError};
pub use types::{now_millis, FacilityId, PrincipalId, SessionToken};
