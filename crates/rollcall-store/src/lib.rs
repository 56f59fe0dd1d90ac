//! # Rollcall Store
//!
//! Storage abstraction for Rollcall Identity. Three traits cover the three
//! things the identity subsystem persists:
//!
//! - [`SessionStore`] - one [`SessionRecord`] per session token
//! - [`CredentialStore`] - principals, role assignments, and password hashes
//! - [`AuditSink`] - the append-only audit trail
//!
//! [`SqliteStore`] implements all three for real deployments and
//! [`MemoryStore`] implements all three for tests.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use rollcall_core::{now_millis, PrincipalId, SessionIdentityState, SessionToken};
//! use rollcall_store::{SessionRecord, SessionStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("identity.db").unwrap();
//!
//!     let token = SessionToken::generate();
//!     let state = SessionIdentityState::normal(PrincipalId(1));
//!     let record = SessionRecord::new(state, now_millis(), 60_000);
//!     store.create_session(&token, &record).await.unwrap();
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Atomic transitions**: [`SessionStore::compare_and_swap`] replaces a
//!   session's state only if it still equals what the caller read. The
//!   compare and the write happen under one lock or one transaction.
//! - **Whole-record teardown**: a session is one row, so deleting it clears
//!   the active and original identities together.
//! - **Expiry**: an expired session reads as absent.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AuditSink, Credential, CredentialStore, SessionRecord, SessionStore, SwapResult};
