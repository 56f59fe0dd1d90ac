//! # Rollcall Testkit
//!
//! Testing utilities for Rollcall Identity.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: a seeded [`IdentityService`](rollcall::IdentityService)
//!   over a fresh store, with a fixed cast of principals
//! - **Failing stores**: [`FailingAuditStore`], for checking that audit
//!   outages never affect identity operations
//! - **Generators**: Proptest strategies for roles, ids, and operation
//!   sequences
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use rollcall_testkit::fixtures::{cast, TestFixture};
//!
//! async fn example() {
//!     let fixture = TestFixture::new().await;
//!     let token = fixture.login("ada").await;
//!     fixture
//!         .service
//!         .start_impersonation(&token, cast::TARGET)
//!         .await
//!         .unwrap();
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use rollcall_testkit::generators::{op_sequence, IdentityOp};
//!
//! proptest! {
//!     #[test]
//!     fn invariant_holds(ops in op_sequence(32)) {
//!         // drive a TestFixture with `ops`, checking the session after each
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{cast, cast_members, seed, FailingAuditStore, TestFixture, PASSWORD};
pub use generators::{any_role, cast_id, known_role, op_sequence, principal_id, IdentityOp};
