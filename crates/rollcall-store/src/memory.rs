//! In-memory implementation of the store traits.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use rollcall_core::{
    AuditEvent, PasswordHash, Principal, PrincipalId, Role, SessionIdentityState, SessionToken,
};

use crate::error::{Result, StoreError};
use crate::traits::{
    AuditSink, Credential, CredentialStore, SessionRecord, SessionStore, SwapResult,
};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock; every
/// operation holds the lock for its whole duration, so compare-and-swap is
/// atomic with respect to every other operation.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Sessions indexed by token.
    sessions: HashMap<SessionToken, SessionRecord>,

    /// Principals indexed by id.
    principals: BTreeMap<PrincipalId, Principal>,

    /// Credentials indexed by username.
    credentials: HashMap<String, Credential>,

    /// Audit trail, oldest first.
    audit: Vec<AuditEvent>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Task(format!("lock poisoned: {}", e)))
    }

    /// Number of stored sessions, live or expired.
    pub fn session_count(&self) -> usize {
        self.read().map(|inner| inner.sessions.len()).unwrap_or(0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, token: &SessionToken, record: &SessionRecord) -> Result<()> {
        let mut inner = self.write()?;
        if inner.sessions.contains_key(token) {
            return Err(StoreError::DuplicateSession);
        }
        inner.sessions.insert(*token, *record);
        Ok(())
    }

    async fn get_session(&self, token: &SessionToken, now: i64) -> Result<Option<SessionRecord>> {
        let inner = self.read()?;
        Ok(inner
            .sessions
            .get(token)
            .filter(|r| !r.is_expired(now))
            .copied())
    }

    async fn compare_and_swap(
        &self,
        token: &SessionToken,
        expected: &SessionIdentityState,
        new: &SessionIdentityState,
        now: i64,
    ) -> Result<SwapResult> {
        let mut inner = self.write()?;

        let Some(record) = inner
            .sessions
            .get_mut(token)
            .filter(|r| !r.is_expired(now))
        else {
            return Ok(SwapResult::Missing);
        };

        if record.state != *expected {
            return Ok(SwapResult::Mismatch {
                current: record.state,
            });
        }

        record.state = *new;
        Ok(SwapResult::Swapped)
    }

    async fn delete_session(&self, token: &SessionToken) -> Result<Option<SessionRecord>> {
        let mut inner = self.write()?;
        Ok(inner.sessions.remove(token))
    }

    async fn purge_expired(&self, now: i64) -> Result<u64> {
        let mut inner = self.write()?;
        let before = inner.sessions.len();
        inner.sessions.retain(|_, r| !r.is_expired(now));
        Ok((before - inner.sessions.len()) as u64)
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn insert_principal(
        &self,
        username: &str,
        password: &PasswordHash,
        principal: &Principal,
    ) -> Result<()> {
        let mut inner = self.write()?;

        if inner.credentials.contains_key(username) {
            return Err(StoreError::DuplicateUsername(username.to_string()));
        }
        if inner.principals.contains_key(&principal.id) {
            return Err(StoreError::DuplicatePrincipal(principal.id.get()));
        }

        inner.principals.insert(principal.id, principal.clone());
        inner.credentials.insert(
            username.to_string(),
            Credential {
                principal_id: principal.id,
                password: password.clone(),
            },
        );
        Ok(())
    }

    async fn find_credential(&self, username: &str) -> Result<Option<Credential>> {
        let inner = self.read()?;
        Ok(inner.credentials.get(username).cloned())
    }

    async fn get_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        let inner = self.read()?;
        Ok(inner.principals.get(&id).cloned())
    }

    async fn set_role(&self, id: PrincipalId, role: &Role) -> Result<Option<Principal>> {
        let mut inner = self.write()?;
        Ok(inner.principals.get_mut(&id).map(|p| {
            *p = p.with_role(role.clone());
            p.clone()
        }))
    }

    async fn set_active(&self, id: PrincipalId, active: bool) -> Result<Option<Principal>> {
        let mut inner = self.write()?;
        Ok(inner.principals.get_mut(&id).map(|p| {
            p.active = active;
            p.clone()
        }))
    }

    async fn next_principal_id(&self) -> Result<PrincipalId> {
        let inner = self.read()?;
        let max = inner.principals.keys().next_back().map_or(0, |id| id.get());
        Ok(PrincipalId(max + 1))
    }
}

#[async_trait]
impl AuditSink for MemoryStore {
    async fn append_audit(&self, event: &AuditEvent) -> Result<()> {
        let mut inner = self.write()?;
        inner.audit.push(event.clone());
        Ok(())
    }

    async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        let inner = self.read()?;
        let start = inner.audit.len().saturating_sub(limit);
        Ok(inner.audit[start..].to_vec())
    }
}
