//! Identity service configuration.

use std::time::Duration;

use rollcall_perms::{names, RoleTemplate};

/// Configuration for the [`IdentityService`](crate::IdentityService).
#[derive(Debug, Clone)]
pub struct IdentityConfig {
    /// How long a session lives after login.
    pub session_ttl: Duration,
    /// Permission a role must carry to start impersonating.
    pub impersonation_capability: String,
    /// Permission a home role must carry to switch roles.
    pub switch_role_capability: String,
    /// Role templates registered on top of the built-in roles.
    pub extra_roles: Vec<RoleTemplate>,
    /// Expired sessions are purged after every this many successful logins.
    /// Zero disables the sweep.
    pub purge_every_logins: u32,
}

impl IdentityConfig {
    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_purge_every_logins(mut self, logins: u32) -> Self {
        self.purge_every_logins = logins;
        self
    }

    pub fn with_role(mut self, template: RoleTemplate) -> Self {
        self.extra_roles.push(template);
        self
    }

    /// Session lifetime in milliseconds, saturating.
    pub(crate) fn session_ttl_millis(&self) -> i64 {
        i64::try_from(self.session_ttl.as_millis()).unwrap_or(i64::MAX)
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(12 * 60 * 60),
            impersonation_capability: names::USERS_IMPERSONATE.to_string(),
            switch_role_capability: names::USERS_SWITCH_ROLE.to_string(),
            extra_roles: Vec::new(),
            purge_every_logins: 64,
        }
    }
}
