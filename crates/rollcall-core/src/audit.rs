//! Audit events: append-only records of identity-affecting actions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::principal::Role;
use crate::types::{now_millis, PrincipalId};

/// What kind of identity action an [`AuditEvent`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    Login,
    LoginFailed,
    Logout,
    ImpersonationStarted,
    ImpersonationStopped,
    RoleSwitched,
}

impl AuditKind {
    /// Stable name used in storage and logs.
    pub const fn as_str(&self) -> &'static str {
        match self {
            AuditKind::Login => "login",
            AuditKind::LoginFailed => "login_failed",
            AuditKind::Logout => "logout",
            AuditKind::ImpersonationStarted => "impersonation_started",
            AuditKind::ImpersonationStopped => "impersonation_stopped",
            AuditKind::RoleSwitched => "role_switched",
        }
    }

    /// Parse a stored name.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "login" => AuditKind::Login,
            "login_failed" => AuditKind::LoginFailed,
            "logout" => AuditKind::Logout,
            "impersonation_started" => AuditKind::ImpersonationStarted,
            "impersonation_stopped" => AuditKind::ImpersonationStopped,
            "role_switched" => AuditKind::RoleSwitched,
            _ => return None,
        })
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of an identity-affecting action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub kind: AuditKind,

    /// Who acted. Absent only for a failed login with an unknown username.
    pub actor_principal_id: Option<PrincipalId>,

    /// Who was acted upon, if anyone other than the actor.
    pub target_principal_id: Option<PrincipalId>,

    /// Unix milliseconds.
    pub timestamp: i64,

    pub metadata: BTreeMap<String, String>,
}

impl AuditEvent {
    /// Create an event stamped with the current time.
    pub fn new(kind: AuditKind, actor: Option<PrincipalId>) -> Self {
        Self {
            kind,
            actor_principal_id: actor,
            target_principal_id: None,
            timestamp: now_millis(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn login(actor: PrincipalId) -> Self {
        Self::new(AuditKind::Login, Some(actor))
    }

    /// A rejected login. `actor` is known only if the username matched.
    pub fn login_failed(actor: Option<PrincipalId>, username: &str) -> Self {
        Self::new(AuditKind::LoginFailed, actor).with_meta("username", username)
    }

    /// A logout by the authenticated principal; `acting_as` is recorded when
    /// the session was impersonating at the time.
    pub fn logout(actor: PrincipalId, acting_as: Option<PrincipalId>) -> Self {
        let mut event = Self::new(AuditKind::Logout, Some(actor));
        event.target_principal_id = acting_as;
        event
    }

    pub fn impersonation_started(actor: PrincipalId, target: PrincipalId) -> Self {
        Self::new(AuditKind::ImpersonationStarted, Some(actor)).with_target(target)
    }

    pub fn impersonation_stopped(actor: PrincipalId, target: PrincipalId) -> Self {
        Self::new(AuditKind::ImpersonationStopped, Some(actor)).with_target(target)
    }

    pub fn role_switched(actor: PrincipalId, from: &Role, to: &Role) -> Self {
        Self::new(AuditKind::RoleSwitched, Some(actor))
            .with_meta("from", from.as_str())
            .with_meta("to", to.as_str())
    }

    pub fn with_target(mut self, target: PrincipalId) -> Self {
        self.target_principal_id = Some(target);
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
