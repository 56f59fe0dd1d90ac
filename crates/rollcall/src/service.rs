//! The identity service: the one owner of session identity.
//!
//! Operations are split across modules by component, each adding an `impl`
//! block to [`IdentityService`]:
//!
//! - `gate` - login, logout, provisioning
//! - `impersonation` - the start/stop state machine
//! - `identity` - the identity read endpoint
//! - `role` - role switching

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use rollcall_core::{
    now_millis, AuditEvent, PasswordHash, Principal, PrincipalId, SessionToken,
};
use rollcall_perms::{is_known_permission, PermissionResolver, PermissionSet, PermsError};
use rollcall_store::{AuditSink, CredentialStore, SessionRecord, SessionStore, StoreError};

use crate::audit::AuditTracker;
use crate::config::IdentityConfig;
use crate::error::{IdentityError, Result};

/// Everything the identity service persists to.
pub trait IdentityStore: SessionStore + CredentialStore + AuditSink + 'static {}

impl<T> IdentityStore for T where T: SessionStore + CredentialStore + AuditSink + 'static {}

/// A principal together with its freshly resolved permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPrincipal {
    #[serde(flatten)]
    pub principal: Principal,
    pub permissions: PermissionSet,
}

/// The answer to "who is acting now, and what can they do".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentIdentity {
    #[serde(flatten)]
    pub principal: Principal,
    pub permissions: PermissionSet,
    pub is_impersonating: bool,
    #[serde(rename = "originalUserId", skip_serializing_if = "Option::is_none")]
    pub original_principal_id: Option<PrincipalId>,
}

/// A freshly established session.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: SessionToken,
    pub identity: ResolvedPrincipal,
}

/// The result of a successful impersonation start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Impersonation {
    /// The target, with the target's own permissions.
    pub impersonated: ResolvedPrincipal,
    /// The requestor, restored on stop.
    pub original: ResolvedPrincipal,
}

/// Session identity management with administrative impersonation.
pub struct IdentityService<S: IdentityStore> {
    /// The storage backend.
    pub(crate) store: Arc<S>,
    /// Role → permission resolution, built once from the config.
    pub(crate) resolver: PermissionResolver,
    pub(crate) config: IdentityConfig,
    pub(crate) audit: AuditTracker,
    /// Successful logins since start, for the periodic purge.
    logins: AtomicU64,
}

impl<S: IdentityStore> IdentityService<S> {
    /// Create a service over `store`.
    ///
    /// Fails if an extra role collides with a built-in one or either
    /// capability is not a catalogue permission.
    pub fn new(store: S, config: IdentityConfig) -> Result<Self> {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Create a service over a store that is also used elsewhere.
    pub fn with_shared_store(store: Arc<S>, config: IdentityConfig) -> Result<Self> {
        for capability in [
            &config.impersonation_capability,
            &config.switch_role_capability,
        ] {
            if !is_known_permission(capability) {
                return Err(PermsError::UnknownPermission(capability.clone()).into());
            }
        }

        let mut resolver = PermissionResolver::with_builtin_roles();
        for template in &config.extra_roles {
            resolver.register(template.clone())?;
        }

        let sink: Arc<dyn AuditSink> = store.clone();
        Ok(Self {
            store,
            resolver,
            config,
            audit: AuditTracker::new(sink),
            logins: AtomicU64::new(0),
        })
    }

    /// Get the store reference.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn resolver(&self) -> &PermissionResolver {
        &self.resolver
    }

    pub fn config(&self) -> &IdentityConfig {
        &self.config
    }

    /// Wait for every pending audit write.
    pub async fn flush_audit(&self) {
        self.audit.flush().await;
    }

    /// The most recent audit events, oldest first.
    pub async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditEvent>> {
        Ok(self.store.recent_audit(limit).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Provisioning
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a credential for `principal`.
    ///
    /// The username is trimmed and lowercased; login normalises the same way.
    pub async fn provision(
        &self,
        username: &str,
        password: &str,
        principal: Principal,
    ) -> Result<Principal> {
        let username = normalize_username(username);
        if username.is_empty() {
            return Err(IdentityError::InvalidInput("username is empty".into()));
        }
        if password.is_empty() {
            return Err(IdentityError::InvalidInput("password is empty".into()));
        }

        let hash = PasswordHash::new(password)?;
        match self.store.insert_principal(&username, &hash, &principal).await {
            Ok(()) => {}
            Err(StoreError::DuplicateUsername(name)) => {
                return Err(IdentityError::UsernameTaken(name))
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(principal = %principal.id, role = %principal.role, "principal provisioned");
        Ok(principal)
    }

    /// An id no existing principal uses.
    pub async fn allocate_principal_id(&self) -> Result<PrincipalId> {
        Ok(self.store.next_principal_id().await?)
    }

    /// Activate or deactivate a principal.
    ///
    /// Sessions acting as an inactive principal read as unauthenticated.
    pub async fn set_principal_active(&self, id: PrincipalId, active: bool) -> Result<Principal> {
        self.store
            .set_active(id, active)
            .await?
            .ok_or_else(|| IdentityError::NotFound(id.to_string()))
    }

    /// Delete every expired session.
    pub async fn purge_expired_sessions(&self) -> Result<u64> {
        let removed = self.store.purge_expired(now_millis()).await?;
        if removed > 0 {
            tracing::debug!(removed, "purged expired sessions");
        }
        Ok(removed)
    }

    /// Count a successful login and purge expired sessions every
    /// `purge_every_logins` of them. A failed purge never fails the login.
    pub(crate) async fn purge_after_login(&self) {
        let every = u64::from(self.config.purge_every_logins);
        if every == 0 {
            return;
        }
        let count = self.logins.fetch_add(1, Ordering::Relaxed) + 1;
        if count % every != 0 {
            return;
        }
        if let Err(e) = self.purge_expired_sessions().await {
            tracing::warn!(error = %e, "periodic session purge failed");
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach fresh permissions to a principal snapshot.
    pub(crate) fn resolve(&self, principal: Principal) -> ResolvedPrincipal {
        let permissions = self.resolver.resolve_principal(&principal);
        ResolvedPrincipal {
            principal,
            permissions,
        }
    }

    /// The live session for `token`, or `Unauthenticated`.
    pub(crate) async fn live_session(&self, token: &SessionToken) -> Result<SessionRecord> {
        self.store
            .get_session(token, now_millis())
            .await?
            .ok_or(IdentityError::Unauthenticated)
    }

    /// An existing, active principal.
    pub(crate) async fn active_principal(&self, id: PrincipalId) -> Result<Option<Principal>> {
        Ok(self.store.get_principal(id).await?.filter(|p| p.active))
    }
}

/// Canonical username form used for both provisioning and login.
pub(crate) fn normalize_username(username: &str) -> String {
    username.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_core::Role;
    use rollcall_perms::{RoleScope, RoleTemplate};
    use rollcall_store::MemoryStore;

    #[test]
    fn test_rejects_unknown_capability() {
        let config = IdentityConfig {
            impersonation_capability: "users.become".into(),
            ..IdentityConfig::default()
        };
        assert!(matches!(
            IdentityService::new(MemoryStore::new(), config),
            Err(IdentityError::Permissions(PermsError::UnknownPermission(_)))
        ));
    }

    #[test]
    fn test_rejects_duplicate_extra_role() {
        let staff = RoleTemplate::new("staff", RoleScope::Global, ["shifts.view"]).unwrap();
        let config = IdentityConfig::default().with_role(staff);
        assert!(matches!(
            IdentityService::new(MemoryStore::new(), config),
            Err(IdentityError::Permissions(PermsError::DuplicateRole(_)))
        ));
    }

    #[test]
    fn test_extra_role_resolves() {
        let auditor = RoleTemplate::new("auditor", RoleScope::Global, ["invoices.view"]).unwrap();
        let service =
            IdentityService::new(MemoryStore::new(), IdentityConfig::default().with_role(auditor))
                .unwrap();
        let perms = service.resolver().resolve(&Role::from("auditor"), None);
        assert!(perms.grants("invoices.view"));
        assert!(!perms.grants("invoices.manage"));
    }

    #[tokio::test]
    async fn test_provision_normalises_username() {
        let service = IdentityService::new(MemoryStore::new(), IdentityConfig::default()).unwrap();
        let ada = Principal::new(PrincipalId(1), "Ada", Role::from("super_admin"));
        service.provision("  Ada ", "pw", ada.clone()).await.unwrap();

        assert!(service.store().find_credential("ada").await.unwrap().is_some());
        assert!(matches!(
            service.provision("ADA", "pw", ada).await,
            Err(IdentityError::UsernameTaken(_))
        ));
        assert!(matches!(
            service
                .provision(" ", "pw", Principal::new(PrincipalId(2), "x", Role::from("staff")))
                .await,
            Err(IdentityError::InvalidInput(_))
        ));
        assert_eq!(service.allocate_principal_id().await.unwrap(), PrincipalId(2));
    }

    #[tokio::test]
    async fn test_set_principal_active_unknown() {
        let service = IdentityService::new(MemoryStore::new(), IdentityConfig::default()).unwrap();
        assert!(matches!(
            service.set_principal_active(PrincipalId(5), false).await,
            Err(IdentityError::NotFound(_))
        ));
    }

    #[test]
    fn test_current_identity_json_shape() {
        let resolver = PermissionResolver::default();
        let nina = Principal::new(PrincipalId(42), "Nina", Role::from("staff"));
        let identity = CurrentIdentity {
            permissions: resolver.resolve_principal(&nina),
            principal: nina,
            is_impersonating: true,
            original_principal_id: Some(PrincipalId(1)),
        };

        let json = serde_json::to_value(&identity).unwrap();
        assert_eq!(json["id"], 42);
        assert_eq!(json["isImpersonating"], true);
        assert_eq!(json["originalUserId"], 1);
        assert!(json.get("originalPrincipalId").is_none());
        assert_eq!(json["permissions"]["shifts.view"], true);
    }
}
