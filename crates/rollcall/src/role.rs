//! Role switching for elevated principals.
//!
//! Elevation is judged on the home role, so a principal that switched down
//! to a plain role can always switch back.

use rollcall_core::{AuditEvent, Role, SessionToken, StateError};

use crate::error::{IdentityError, Result};
use crate::service::{IdentityService, IdentityStore, ResolvedPrincipal};

impl<S: IdentityStore> IdentityService<S> {
    /// Set the session principal's current role to `role`.
    ///
    /// Not allowed while impersonating: the switch would rewrite the
    /// target's role assignment.
    pub async fn switch_role(&self, token: &SessionToken, role: &Role) -> Result<ResolvedPrincipal> {
        let record = self.live_session(token).await?;
        if record.state.is_impersonating() {
            tracing::debug!(session = %token, "role switch rejected while impersonating");
            return Err(StateError::ImpersonationActive.into());
        }

        let principal = self
            .active_principal(record.state.active())
            .await?
            .ok_or(IdentityError::Unauthenticated)?;

        if !self
            .resolver
            .has_capability(&principal.home_role, &self.config.switch_role_capability)
        {
            tracing::debug!(actor = %principal.id, "role switch rejected: not elevated");
            return Err(IdentityError::Authorization(
                "role switching requires an elevated role".into(),
            ));
        }

        let requested = match role.canonical() {
            Some(name) if self.resolver.is_known_role(role) => Role::new(name),
            _ => {
                tracing::debug!(actor = %principal.id, "role switch rejected: unknown role");
                return Err(IdentityError::Authorization("unknown role".into()));
            }
        };

        let updated = self
            .store
            .set_role(principal.id, &requested)
            .await?
            .ok_or(IdentityError::Unauthenticated)?;

        tracing::info!(
            actor = %principal.id,
            from = %principal.role,
            to = %updated.role,
            session = %token,
            "role switched"
        );
        self.audit.record(AuditEvent::role_switched(
            principal.id,
            &principal.role,
            &updated.role,
        ));

        Ok(self.resolve(updated))
    }
}
