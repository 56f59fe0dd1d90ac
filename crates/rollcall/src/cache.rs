//! Client identity cache.
//!
//! A client-side mirror of the server identity. It holds whatever the last
//! read returned and nothing else: every mutating call clears it, and the
//! next [`IdentityCache::current`] re-reads from the source.

use std::sync::Arc;

use async_trait::async_trait;
use rollcall_core::{PrincipalId, Role, SessionToken};

use crate::error::{IdentityError, Result};
use crate::service::{
    CurrentIdentity, Impersonation, IdentityService, IdentityStore, LoginOutcome,
    ResolvedPrincipal,
};

/// Where a client gets identity answers from.
///
/// [`IdentityService`] implements this for in-process use; an HTTP client
/// would implement it over the routes in `rollcall-server`.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    async fn login(
        &self,
        username: &str,
        password: &str,
        previous: Option<&SessionToken>,
    ) -> Result<LoginOutcome>;

    async fn logout(&self, token: &SessionToken) -> Result<()>;

    async fn current_identity(&self, token: &SessionToken) -> Result<CurrentIdentity>;

    async fn start_impersonation(
        &self,
        token: &SessionToken,
        target: PrincipalId,
    ) -> Result<Impersonation>;

    async fn stop_impersonation(&self, token: &SessionToken) -> Result<ResolvedPrincipal>;

    async fn switch_role(&self, token: &SessionToken, role: &Role) -> Result<ResolvedPrincipal>;
}

#[async_trait]
impl<S: IdentityStore> IdentitySource for IdentityService<S> {
    async fn login(
        &self,
        username: &str,
        password: &str,
        previous: Option<&SessionToken>,
    ) -> Result<LoginOutcome> {
        IdentityService::login(self, username, password, previous).await
    }

    async fn logout(&self, token: &SessionToken) -> Result<()> {
        IdentityService::logout(self, token).await
    }

    async fn current_identity(&self, token: &SessionToken) -> Result<CurrentIdentity> {
        IdentityService::current_identity(self, token).await
    }

    async fn start_impersonation(
        &self,
        token: &SessionToken,
        target: PrincipalId,
    ) -> Result<Impersonation> {
        IdentityService::start_impersonation(self, token, target).await
    }

    async fn stop_impersonation(&self, token: &SessionToken) -> Result<ResolvedPrincipal> {
        IdentityService::stop_impersonation(self, token).await
    }

    async fn switch_role(&self, token: &SessionToken, role: &Role) -> Result<ResolvedPrincipal> {
        IdentityService::switch_role(self, token, role).await
    }
}

#[async_trait]
impl<T: IdentitySource + ?Sized> IdentitySource for Arc<T> {
    async fn login(
        &self,
        username: &str,
        password: &str,
        previous: Option<&SessionToken>,
    ) -> Result<LoginOutcome> {
        (**self).login(username, password, previous).await
    }

    async fn logout(&self, token: &SessionToken) -> Result<()> {
        (**self).logout(token).await
    }

    async fn current_identity(&self, token: &SessionToken) -> Result<CurrentIdentity> {
        (**self).current_identity(token).await
    }

    async fn start_impersonation(
        &self,
        token: &SessionToken,
        target: PrincipalId,
    ) -> Result<Impersonation> {
        (**self).start_impersonation(token, target).await
    }

    async fn stop_impersonation(&self, token: &SessionToken) -> Result<ResolvedPrincipal> {
        (**self).stop_impersonation(token).await
    }

    async fn switch_role(&self, token: &SessionToken, role: &Role) -> Result<ResolvedPrincipal> {
        (**self).switch_role(token, role).await
    }
}

/// One client's view of its identity.
pub struct IdentityCache<S: IdentitySource> {
    source: S,
    token: Option<SessionToken>,
    cached: Option<CurrentIdentity>,
}

impl<S: IdentitySource> IdentityCache<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            token: None,
            cached: None,
        }
    }

    /// The session token this client holds, if logged in.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    /// Whether an identity is cached right now.
    pub fn is_cached(&self) -> bool {
        self.cached.is_some()
    }

    /// Drop the cached identity.
    pub fn invalidate(&mut self) {
        self.cached = None;
    }

    /// The current identity, read from the source on a miss.
    pub async fn current(&mut self) -> Result<&CurrentIdentity> {
        if self.cached.is_none() {
            let token = self.token.as_ref().ok_or(IdentityError::Unauthenticated)?;
            let identity = self.source.current_identity(token).await?;
            self.cached = Some(identity);
        }
        self.cached.as_ref().ok_or(IdentityError::Unauthenticated)
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<ResolvedPrincipal> {
        self.invalidate();
        let previous = self.token.take();
        let outcome = self
            .source
            .login(username, password, previous.as_ref())
            .await?;
        self.token = Some(outcome.token);
        Ok(outcome.identity)
    }

    /// Log out. The token is forgotten even if the source call fails.
    pub async fn logout(&mut self) -> Result<()> {
        self.invalidate();
        match self.token.take() {
            Some(token) => self.source.logout(&token).await,
            None => Ok(()),
        }
    }

    pub async fn start_impersonation(&mut self, target: PrincipalId) -> Result<Impersonation> {
        self.invalidate();
        let token = self.token.ok_or(IdentityError::Unauthenticated)?;
        self.source.start_impersonation(&token, target).await
    }

    pub async fn stop_impersonation(&mut self) -> Result<ResolvedPrincipal> {
        self.invalidate();
        let token = self.token.ok_or(IdentityError::Unauthenticated)?;
        self.source.stop_impersonation(&token).await
    }

    pub async fn switch_role(&mut self, role: &Role) -> Result<ResolvedPrincipal> {
        self.invalidate();
        let token = self.token.ok_or(IdentityError::Unauthenticated)?;
        self.source.switch_role(&token, role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use rollcall_core::Principal;
    use rollcall_store::MemoryStore;

    async fn cache() -> IdentityCache<Arc<IdentityService<MemoryStore>>> {
        let service = IdentityService::new(MemoryStore::new(), IdentityConfig::default()).unwrap();
        service
            .provision(
                "ada",
                "pw",
                Principal::new(PrincipalId(1), "Ada", Role::from("super_admin")),
            )
            .await
            .unwrap();
        service
            .provision(
                "nina",
                "pw",
                Principal::new(PrincipalId(42), "Nina", Role::from("staff")),
            )
            .await
            .unwrap();
        IdentityCache::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_current_requires_login() {
        let mut cache = cache().await;
        assert!(matches!(
            cache.current().await,
            Err(IdentityError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_mutations_invalidate() {
        let mut cache = cache().await;
        cache.login("ada", "pw").await.unwrap();
        assert!(!cache.is_cached());

        assert_eq!(cache.current().await.unwrap().principal.id, PrincipalId(1));
        assert!(cache.is_cached());

        cache.start_impersonation(PrincipalId(42)).await.unwrap();
        assert!(!cache.is_cached());
        let identity = cache.current().await.unwrap();
        assert_eq!(identity.principal.id, PrincipalId(42));
        assert_eq!(identity.original_principal_id, Some(PrincipalId(1)));

        // A failed mutation still invalidates.
        cache.current().await.unwrap();
        assert!(cache.start_impersonation(PrincipalId(1)).await.is_err());
        assert!(!cache.is_cached());

        cache.stop_impersonation().await.unwrap();
        assert!(!cache.current().await.unwrap().is_impersonating);

        cache.logout().await.unwrap();
        assert!(cache.token().is_none());
        assert!(matches!(
            cache.current().await,
            Err(IdentityError::Unauthenticated)
        ));
    }
}
