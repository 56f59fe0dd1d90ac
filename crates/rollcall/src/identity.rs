//! Identity read endpoint.
//!
//! The only way the rest of the application learns who is acting and what
//! they may do. Reads never mutate the session.

use rollcall_core::{FacilityId, SessionToken};
use rollcall_perms::FacilityContext;

use crate::error::{IdentityError, Result};
use crate::service::{CurrentIdentity, IdentityService, IdentityStore};

impl<S: IdentityStore> IdentityService<S> {
    /// The session's active principal with freshly resolved permissions.
    ///
    /// A session whose active principal no longer exists, or is inactive,
    /// reads as `Unauthenticated`.
    pub async fn current_identity(&self, token: &SessionToken) -> Result<CurrentIdentity> {
        let record = self.live_session(token).await?;
        let state = record.state;

        let principal = self
            .active_principal(state.active())
            .await?
            .ok_or(IdentityError::Unauthenticated)?;
        let permissions = self.resolver.resolve_principal(&principal);

        Ok(CurrentIdentity {
            principal,
            permissions,
            is_impersonating: state.is_impersonating(),
            original_principal_id: state.original(),
        })
    }

    /// Whether the current identity holds `permission`.
    ///
    /// False for unauthenticated sessions, unknown permission names, and
    /// storage failures.
    pub async fn has_permission(&self, token: &SessionToken, permission: &str) -> bool {
        self.check(token, permission, None).await
    }

    /// Whether the current identity holds `permission` within one facility.
    pub async fn has_permission_in(
        &self,
        token: &SessionToken,
        permission: &str,
        facility: FacilityId,
    ) -> bool {
        self.check(token, permission, Some(facility)).await
    }

    async fn check(
        &self,
        token: &SessionToken,
        permission: &str,
        facility: Option<FacilityId>,
    ) -> bool {
        let identity = match self.current_identity(token).await {
            Ok(identity) => identity,
            Err(IdentityError::Unauthenticated) => return false,
            Err(e) => {
                tracing::error!(error = %e, session = %token, "permission check failed");
                return false;
            }
        };

        match facility {
            None => identity.permissions.grants(permission),
            Some(facility) => {
                let ctx = FacilityContext::for_principal(&identity.principal).in_facility(facility);
                self.resolver
                    .resolve(&identity.principal.role, Some(&ctx))
                    .grants(permission)
            }
        }
    }
}
