//! Store traits: the abstract interface for identity persistence.
//!
//! These traits let the identity service be storage-agnostic. Implementations
//! include SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use rollcall_core::{
    AuditEvent, PasswordHash, Principal, PrincipalId, Role, SessionIdentityState, SessionToken,
};

use crate::error::Result;

/// A persisted session: its identity state plus lifetime bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionRecord {
    pub state: SessionIdentityState,

    /// When the session was created (Unix ms).
    pub created_at: i64,

    /// When the session stops being valid (Unix ms).
    pub expires_at: i64,
}

impl SessionRecord {
    /// A record created at `now` that lives for `ttl_ms`.
    pub fn new(state: SessionIdentityState, now: i64, ttl_ms: i64) -> Self {
        Self {
            state,
            created_at: now,
            expires_at: now.saturating_add(ttl_ms),
        }
    }

    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }
}

/// Outcome of [`SessionStore::compare_and_swap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapResult {
    /// The state matched and was replaced.
    Swapped,
    /// Another request changed the state first; nothing was written.
    Mismatch {
        /// The state as it is now.
        current: SessionIdentityState,
    },
    /// The session no longer exists (logged out or expired).
    Missing,
}

/// A stored credential.
#[derive(Debug, Clone)]
pub struct Credential {
    pub principal_id: PrincipalId,
    pub password: PasswordHash,
}

/// Server-side session records keyed by token.
///
/// # Design Notes
///
/// - A session's identity state is only ever replaced whole, through
///   [`compare_and_swap`](Self::compare_and_swap).
/// - Expired records behave as absent for every read and swap.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Store a new session. Fails with `DuplicateSession` if the token is taken.
    async fn create_session(&self, token: &SessionToken, record: &SessionRecord) -> Result<()>;

    /// Get a live session's record.
    async fn get_session(&self, token: &SessionToken, now: i64) -> Result<Option<SessionRecord>>;

    /// Replace the session's state with `new` iff it currently equals `expected`.
    ///
    /// The compare and the write are one atomic step.
    async fn compare_and_swap(
        &self,
        token: &SessionToken,
        expected: &SessionIdentityState,
        new: &SessionIdentityState,
        now: i64,
    ) -> Result<SwapResult>;

    /// Delete a session, returning the record that was removed (live or not).
    async fn delete_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>>;

    /// Delete every expired session, returning how many were removed.
    async fn purge_expired(&self, now: i64) -> Result<u64>;
}

/// Principals and their credentials.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Register a principal under `username`.
    ///
    /// Usernames are stored as given; callers normalise them.
    async fn insert_principal(
        &self,
        username: &str,
        password: &PasswordHash,
        principal: &Principal,
    ) -> Result<()>;

    /// Look up the credential for `username`.
    async fn find_credential(&self, username: &str) -> Result<Option<Credential>>;

    /// Fetch a principal snapshot.
    async fn get_principal(&self, id: PrincipalId) -> Result<Option<Principal>>;

    /// Change a principal's current role. Returns the updated snapshot.
    async fn set_role(&self, id: PrincipalId, role: &Role) -> Result<Option<Principal>>;

    /// Activate or deactivate a principal. Returns the updated snapshot.
    async fn set_active(&self, id: PrincipalId, active: bool) -> Result<Option<Principal>>;

    /// The smallest id greater than every existing principal id.
    async fn next_principal_id(&self) -> Result<PrincipalId>;
}

/// The append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one event.
    async fn append_audit(&self, event: &AuditEvent) -> Result<()>;

    /// The most recent `limit` events, oldest first.
    async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEvent>>;
}
