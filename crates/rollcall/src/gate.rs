//! Authentication gate: login and logout.

use rollcall_core::{
    now_millis, AuditEvent, PasswordHash, PrincipalId, SessionIdentityState, SessionToken,
};
use rollcall_store::SessionRecord;

use crate::error::{IdentityError, Result};
use crate::service::{normalize_username, IdentityService, IdentityStore, LoginOutcome};

impl<S: IdentityStore> IdentityService<S> {
    /// Verify credentials and open a new session in the Normal state.
    ///
    /// `previous` is the token the caller already held, if any. Once the
    /// credentials check out, that session is logged out so a login never
    /// inherits an old session. A failed login leaves it untouched.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        previous: Option<&SessionToken>,
    ) -> Result<LoginOutcome> {
        let username = normalize_username(username);
        let credential = self.store.find_credential(&username).await?;

        let Some(credential) = credential else {
            // Same hashing work as a real check.
            PasswordHash::dummy().verify(password);
            return Err(self.reject_login(None, &username));
        };

        if !credential.password.verify(password) {
            return Err(self.reject_login(Some(credential.principal_id), &username));
        }

        let Some(principal) = self.active_principal(credential.principal_id).await? else {
            return Err(self.reject_login(Some(credential.principal_id), &username));
        };

        if let Some(previous) = previous {
            self.logout(previous).await?;
        }

        let token = SessionToken::generate();
        let record = SessionRecord::new(
            SessionIdentityState::normal(principal.id),
            now_millis(),
            self.config.session_ttl_millis(),
        );
        self.store.create_session(&token, &record).await?;

        tracing::info!(actor = %principal.id, session = %token, "login");
        self.audit.record(AuditEvent::login(principal.id));
        self.purge_after_login().await;

        Ok(LoginOutcome {
            token,
            identity: self.resolve(principal),
        })
    }

    fn reject_login(&self, actor: Option<PrincipalId>, username: &str) -> IdentityError {
        tracing::debug!(actor = ?actor, "login rejected");
        self.audit.record(AuditEvent::login_failed(actor, username));
        IdentityError::Authentication
    }

    /// Destroy the session, both the active and the original identity.
    ///
    /// An unknown or already-expired token is not an error.
    pub async fn logout(&self, token: &SessionToken) -> Result<()> {
        let Some(record) = self.store.delete_session(token).await? else {
            return Ok(());
        };

        let state = record.state;
        let acting_as = state.is_impersonating().then(|| state.active());

        tracing::info!(
            actor = %state.authenticated(),
            acting_as = ?acting_as,
            session = %token,
            "logout"
        );
        self.audit
            .record(AuditEvent::logout(state.authenticated(), acting_as));
        Ok(())
    }
}
