//! Impersonation controller.
//!
//! Two transitions, Normal → Impersonating and back. Each one reads the
//! session record, checks its preconditions against what it read, and then
//! asks the store to swap the record only if it is still unchanged. A lost
//! swap is reported against the state that won, never retried blindly for
//! start: a second concurrent start must see "already impersonating".

use rollcall_core::{
    now_millis, AuditEvent, Principal, PrincipalId, SessionIdentityState, SessionToken,
    StateError,
};
use rollcall_store::SwapResult;

use crate::error::{IdentityError, Result};
use crate::service::{Impersonation, IdentityService, IdentityStore, ResolvedPrincipal};

impl<S: IdentityStore> IdentityService<S> {
    /// Start impersonating `target` as the session's active principal.
    ///
    /// The requestor is re-read from the credential store; nothing about the
    /// requestor is taken from the caller.
    pub async fn start_impersonation(
        &self,
        token: &SessionToken,
        target: PrincipalId,
    ) -> Result<Impersonation> {
        let record = self.live_session(token).await?;
        let requestor = self
            .active_principal(record.state.active())
            .await?
            .ok_or(IdentityError::Unauthenticated)?;

        self.begin(token, record.state, &requestor, target).await
    }

    /// Start impersonating `target` on behalf of an already-loaded requestor.
    ///
    /// Preconditions, in order:
    ///
    /// 1. the session is Normal (else `StateError`)
    /// 2. the requestor is the session's active principal (else `StateError`)
    /// 3. the requestor's role carries the impersonation capability
    ///    (else `Authorization`, whether or not the target exists)
    /// 4. the target exists and is active (else `NotFound`)
    /// 5. the target is not the requestor (else `StateError`)
    pub async fn start_impersonation_as(
        &self,
        token: &SessionToken,
        requestor: &Principal,
        target: PrincipalId,
    ) -> Result<Impersonation> {
        let record = self.live_session(token).await?;
        self.begin(token, record.state, requestor, target).await
    }

    async fn begin(
        &self,
        token: &SessionToken,
        current: SessionIdentityState,
        requestor: &Principal,
        target: PrincipalId,
    ) -> Result<Impersonation> {
        let rejected = |e: IdentityError| {
            tracing::debug!(
                actor = %requestor.id,
                target = %target,
                session = %token,
                reason = %e,
                "impersonation start rejected"
            );
            e
        };

        current.ensure_normal().map_err(|e| rejected(e.into()))?;
        if requestor.id != current.active() {
            return Err(rejected(StateError::RequestorNotActive.into()));
        }
        if !self
            .resolver
            .has_capability(&requestor.role, &self.config.impersonation_capability)
        {
            return Err(rejected(IdentityError::Authorization(
                "impersonation requires an elevated role".into(),
            )));
        }

        let target_principal = self
            .active_principal(target)
            .await?
            .ok_or_else(|| rejected(IdentityError::NotFound(target.to_string())))?;

        let next = current
            .begin_impersonation(requestor.id, target_principal.id)
            .map_err(|e| rejected(e.into()))?;

        match self
            .store
            .compare_and_swap(token, &current, &next, now_millis())
            .await?
        {
            SwapResult::Swapped => {}
            SwapResult::Mismatch { current: winner } => {
                return Err(rejected(start_conflict(&winner).into()));
            }
            SwapResult::Missing => return Err(rejected(IdentityError::Unauthenticated)),
        }

        tracing::info!(
            actor = %requestor.id,
            target = %target_principal.id,
            session = %token,
            "impersonation started"
        );
        self.audit.record(AuditEvent::impersonation_started(
            requestor.id,
            target_principal.id,
        ));

        Ok(Impersonation {
            impersonated: self.resolve(target_principal),
            original: self.resolve(requestor.clone()),
        })
    }

    /// Stop impersonating and restore the original principal.
    ///
    /// If the original principal has been deleted or deactivated since, the
    /// session still returns to Normal and the call reports
    /// `Unauthenticated`.
    pub async fn stop_impersonation(&self, token: &SessionToken) -> Result<ResolvedPrincipal> {
        let mut current = self.live_session(token).await?.state;

        let restored = loop {
            let next = current.end_impersonation().map_err(|e| {
                tracing::debug!(session = %token, reason = %e, "impersonation stop rejected");
                IdentityError::from(e)
            })?;

            match self
                .store
                .compare_and_swap(token, &current, &next, now_millis())
                .await?
            {
                SwapResult::Swapped => break next,
                // Someone else changed the record; stop whatever it holds now.
                SwapResult::Mismatch { current: winner } => current = winner,
                SwapResult::Missing => return Err(IdentityError::Unauthenticated),
            }
        };

        let original = restored.active();
        let impersonated = current.active();

        tracing::info!(
            actor = %original,
            target = %impersonated,
            session = %token,
            "impersonation stopped"
        );
        self.audit
            .record(AuditEvent::impersonation_stopped(original, impersonated));

        let principal = self.active_principal(original).await?.ok_or_else(|| {
            tracing::warn!(actor = %original, session = %token, "restored principal no longer active");
            IdentityError::Unauthenticated
        })?;

        Ok(self.resolve(principal))
    }
}

/// Why a start lost its swap, judged against the state that won.
fn start_conflict(winner: &SessionIdentityState) -> StateError {
    match winner.ensure_normal() {
        Err(e) => e,
        Ok(()) => StateError::RequestorNotActive,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IdentityConfig;
    use rollcall_core::{AuditKind, FacilityId, Role};
    use rollcall_store::{CredentialStore, MemoryStore, SessionStore};
    use std::sync::Arc;

    async fn service() -> IdentityService<MemoryStore> {
        let service = IdentityService::new(MemoryStore::new(), IdentityConfig::default()).unwrap();
        let cast = [
            ("ada", Principal::new(PrincipalId(1), "Ada Admin", Role::from("super_admin"))),
            (
                "nina",
                Principal::new(PrincipalId(42), "Nina Nurse", Role::from("staff")),
            ),
            (
                "fred",
                Principal::new(PrincipalId(99), "Fred Manager", Role::from("facility_manager"))
                    .with_facilities([FacilityId(3)]),
            ),
            ("carl", Principal::new(PrincipalId(7), "Carl Clerk", Role::from("admin"))),
            ("sam", Principal::new(PrincipalId(5), "Sam Staff", Role::from("staff"))),
        ];
        for (username, principal) in cast {
            service.provision(username, "pw", principal).await.unwrap();
        }
        service
    }

    async fn session(service: &IdentityService<MemoryStore>, username: &str) -> SessionToken {
        service.login(username, "pw", None).await.unwrap().token
    }

    async fn state(
        service: &IdentityService<MemoryStore>,
        token: &SessionToken,
    ) -> SessionIdentityState {
        service
            .store()
            .get_session(token, now_millis())
            .await
            .unwrap()
            .unwrap()
            .state
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let service = service().await;
        let token = session(&service, "ada").await;

        let imp = service
            .start_impersonation(&token, PrincipalId(42))
            .await
            .unwrap();
        assert_eq!(imp.impersonated.principal.id, PrincipalId(42));
        assert_eq!(imp.original.principal.id, PrincipalId(1));
        // The target's own permissions, never the requestor's.
        assert!(!imp.impersonated.permissions.grants("users.impersonate"));
        assert!(imp.impersonated.permissions.grants("shifts.view"));

        let s = state(&service, &token).await;
        assert_eq!(s.active(), PrincipalId(42));
        assert_eq!(s.original(), Some(PrincipalId(1)));
        assert!(s.is_impersonating());

        let restored = service.stop_impersonation(&token).await.unwrap();
        assert_eq!(restored.principal.id, PrincipalId(1));
        assert!(restored.permissions.grants("users.impersonate"));
        assert_eq!(state(&service, &token).await, SessionIdentityState::normal(PrincipalId(1)));

        service.flush_audit().await;
        let kinds: Vec<_> = service
            .recent_audit(10)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect();
        assert!(kinds.contains(&AuditKind::ImpersonationStarted));
        assert!(kinds.contains(&AuditKind::ImpersonationStopped));
    }

    #[tokio::test]
    async fn test_double_start_is_state_error() {
        let service = service().await;
        let token = session(&service, "ada").await;

        service
            .start_impersonation_as(
                &token,
                &service.store().get_principal(PrincipalId(1)).await.unwrap().unwrap(),
                PrincipalId(42),
            )
            .await
            .unwrap();

        // The state check comes first, even though 42 is not elevated.
        let err = service
            .start_impersonation(&token, PrincipalId(99))
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::State(StateError::AlreadyImpersonating)));

        let s = state(&service, &token).await;
        assert_eq!(s.original(), Some(PrincipalId(1)));
        assert_eq!(s.active(), PrincipalId(42));
    }

    #[tokio::test]
    async fn test_non_elevated_is_unauthorized_even_for_missing_target() {
        let service = service().await;
        let token = session(&service, "carl").await;

        for target in [PrincipalId(5), PrincipalId(12345), PrincipalId(7)] {
            let err = service.start_impersonation(&token, target).await.unwrap_err();
            assert!(matches!(err, IdentityError::Authorization(_)), "{:?}", err);
        }
        assert_eq!(state(&service, &token).await, SessionIdentityState::normal(PrincipalId(7)));
    }

    #[tokio::test]
    async fn test_target_errors() {
        let service = service().await;
        let token = session(&service, "ada").await;

        assert!(matches!(
            service.start_impersonation(&token, PrincipalId(12345)).await,
            Err(IdentityError::NotFound(_))
        ));

        service
            .set_principal_active(PrincipalId(42), false)
            .await
            .unwrap();
        assert!(matches!(
            service.start_impersonation(&token, PrincipalId(42)).await,
            Err(IdentityError::NotFound(_))
        ));

        assert!(matches!(
            service.start_impersonation(&token, PrincipalId(1)).await,
            Err(IdentityError::State(StateError::SelfImpersonation))
        ));
        assert!(!state(&service, &token).await.is_impersonating());
    }

    #[tokio::test]
    async fn test_requestor_must_be_active_principal() {
        let service = service().await;
        let token = session(&service, "carl").await;
        let ada = service.store().get_principal(PrincipalId(1)).await.unwrap().unwrap();

        assert!(matches!(
            service.start_impersonation_as(&token, &ada, PrincipalId(42)).await,
            Err(IdentityError::State(StateError::RequestorNotActive))
        ));
    }

    #[tokio::test]
    async fn test_stop_when_normal_is_state_error() {
        let service = service().await;
        let token = session(&service, "ada").await;
        assert!(matches!(
            service.stop_impersonation(&token).await,
            Err(IdentityError::State(StateError::NotImpersonating))
        ));
    }

    #[tokio::test]
    async fn test_unknown_session_is_unauthenticated() {
        let service = service().await;
        let token = SessionToken::generate();
        assert!(matches!(
            service.start_impersonation(&token, PrincipalId(42)).await,
            Err(IdentityError::Unauthenticated)
        ));
        assert!(matches!(
            service.stop_impersonation(&token).await,
            Err(IdentityError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_stop_with_deactivated_original() {
        let service = service().await;
        let token = session(&service, "ada").await;
        service
            .start_impersonation(&token, PrincipalId(42))
            .await
            .unwrap();
        service
            .set_principal_active(PrincipalId(1), false)
            .await
            .unwrap();

        assert!(matches!(
            service.stop_impersonation(&token).await,
            Err(IdentityError::Unauthenticated)
        ));
        assert_eq!(state(&service, &token).await, SessionIdentityState::normal(PrincipalId(1)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_starts_exactly_one_wins() {
        let service = Arc::new(service().await);
        let token = session(&service, "ada").await;
        let ada = service.store().get_principal(PrincipalId(1)).await.unwrap().unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let service = service.clone();
            let ada = ada.clone();
            let target = if i % 2 == 0 { PrincipalId(42) } else { PrincipalId(99) };
            handles.push(tokio::spawn(async move {
                service.start_impersonation_as(&token, &ada, target).await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => wins += 1,
                Err(IdentityError::State(StateError::AlreadyImpersonating)) => {}
                Err(e) => panic!("unexpected error: {:?}", e),
            }
        }
        assert_eq!(wins, 1);

        let s = state(&service, &token).await;
        assert!(s.is_consistent());
        assert_eq!(s.original(), Some(PrincipalId(1)));
    }
}
