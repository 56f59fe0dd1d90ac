//! The per-session identity record and its two transitions.
//!
//! A session is in one of two states:
//!
//! - **Normal**: `active` is the logged-in principal, no original is recorded.
//! - **Impersonating**: `active` is the target, `original` is the principal
//!   that started the impersonation and will be restored on stop.
//!
//! `is_impersonating` holds iff `original` is present and differs from
//! `active`. Every constructor, both transitions, and deserialization enforce
//! this, so an orphaned original (set while not impersonating) cannot exist.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::CoreError;
use crate::types::PrincipalId;

/// An invalid identity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StateError {
    /// Start requested while already impersonating.
    #[error("already impersonating; stop the current impersonation first")]
    AlreadyImpersonating,

    /// Stop requested while not impersonating.
    #[error("not currently impersonating")]
    NotImpersonating,

    /// Start requested with the requestor as the target.
    #[error("cannot impersonate yourself")]
    SelfImpersonation,

    /// The requestor is not the principal the session is acting as.
    #[error("requestor is not the active principal of this session")]
    RequestorNotActive,

    /// An operation that must not run while impersonating.
    #[error("not allowed while impersonating; stop the impersonation first")]
    ImpersonationActive,
}

/// The authoritative identity record for one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "RawSessionIdentityState",
    into = "RawSessionIdentityState"
)]
pub struct SessionIdentityState {
    active: PrincipalId,
    original: Option<PrincipalId>,
    impersonating: bool,
}

/// Wire form of [`SessionIdentityState`]; validated on the way in.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSessionIdentityState {
    active_principal_id: PrincipalId,
    original_principal_id: Option<PrincipalId>,
    is_impersonating: bool,
}

impl SessionIdentityState {
    /// A fresh Normal state for a principal that just logged in.
    pub const fn normal(active: PrincipalId) -> Self {
        Self {
            active,
            original: None,
            impersonating: false,
        }
    }

    /// Rebuild a state from its three fields, checking the invariant.
    pub fn from_parts(
        active: PrincipalId,
        original: Option<PrincipalId>,
        impersonating: bool,
    ) -> Result<Self, CoreError> {
        match (original, impersonating) {
            (None, false) => Ok(Self::normal(active)),
            (Some(original), true) if original != active => Ok(Self {
                active,
                original: Some(original),
                impersonating: true,
            }),
            (Some(_), true) => Err(CoreError::InvalidSessionState(
                "original principal equals active principal".into(),
            )),
            (Some(_), false) => Err(CoreError::InvalidSessionState(
                "original principal recorded while not impersonating".into(),
            )),
            (None, true) => Err(CoreError::InvalidSessionState(
                "impersonating without an original principal".into(),
            )),
        }
    }

    /// The principal this session currently acts as.
    pub const fn active(&self) -> PrincipalId {
        self.active
    }

    /// The principal to restore on stop, if impersonating.
    pub const fn original(&self) -> Option<PrincipalId> {
        self.original
    }

    pub const fn is_impersonating(&self) -> bool {
        self.impersonating
    }

    /// The principal that actually authenticated this session.
    pub fn authenticated(&self) -> PrincipalId {
        self.original.unwrap_or(self.active)
    }

    /// Fail unless the session is in the Normal state.
    pub fn ensure_normal(&self) -> Result<(), StateError> {
        if self.impersonating {
            Err(StateError::AlreadyImpersonating)
        } else {
            Ok(())
        }
    }

    /// Normal → Impersonating.
    ///
    /// `requestor` must be the active principal and must differ from `target`.
    /// The current state is left untouched; the caller persists the result.
    pub fn begin_impersonation(
        &self,
        requestor: PrincipalId,
        target: PrincipalId,
    ) -> Result<Self, StateError> {
        self.ensure_normal()?;
        if requestor != self.active {
            return Err(StateError::RequestorNotActive);
        }
        if target == requestor {
            return Err(StateError::SelfImpersonation);
        }
        Ok(Self {
            active: target,
            original: Some(requestor),
            impersonating: true,
        })
    }

    /// Impersonating → Normal, restoring the original principal.
    pub fn end_impersonation(&self) -> Result<Self, StateError> {
        match (self.impersonating, self.original) {
            (true, Some(original)) => Ok(Self::normal(original)),
            _ => Err(StateError::NotImpersonating),
        }
    }

    /// Check the impersonation invariant.
    pub fn is_consistent(&self) -> bool {
        self.impersonating == matches!(self.original, Some(o) if o != self.active)
    }
}

impl TryFrom<RawSessionIdentityState> for SessionIdentityState {
    type Error = CoreError;

    fn try_from(raw: RawSessionIdentityState) -> Result<Self, Self::Error> {
        Self::from_parts(
            raw.active_principal_id,
            raw.original_principal_id,
            raw.is_impersonating,
        )
    }
}

impl From<SessionIdentityState> for RawSessionIdentityState {
    fn from(state: SessionIdentityState) -> Self {
        Self {
            active_principal_id: state.active,
            original_principal_id: state.original,
            is_impersonating: state.impersonating,
        }
    }
}
