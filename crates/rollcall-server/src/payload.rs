//! JSON request and response bodies.

use std::collections::BTreeMap;

use rollcall::core::FacilityId;
use rollcall::{CurrentIdentity, Principal, PrincipalId, ResolvedPrincipal, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartImpersonationRequest {
    pub target_user_id: PrincipalId,
}

#[derive(Debug, Deserialize)]
pub struct SwitchRoleRequest {
    pub role: String,
}

/// The user payload every identity route returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBody {
    pub id: PrincipalId,
    pub display_name: String,
    pub role: Role,
    pub home_role: Role,
    pub facilities: Vec<FacilityId>,
    pub permissions: BTreeMap<String, bool>,
    pub is_impersonating: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_user_id: Option<PrincipalId>,
}

impl UserBody {
    fn build(
        principal: Principal,
        permissions: BTreeMap<String, bool>,
        original: Option<PrincipalId>,
    ) -> Self {
        Self {
            id: principal.id,
            display_name: principal.display_name,
            role: principal.role,
            home_role: principal.home_role,
            facilities: principal.facilities,
            permissions,
            is_impersonating: original.is_some(),
            original_user_id: original,
        }
    }

    /// A principal the session is acting as itself.
    pub fn normal(resolved: ResolvedPrincipal) -> Self {
        Self::build(
            resolved.principal,
            resolved.permissions.as_map().clone(),
            None,
        )
    }

    /// A principal being impersonated by `original`.
    pub fn impersonated(resolved: ResolvedPrincipal, original: PrincipalId) -> Self {
        Self::build(
            resolved.principal,
            resolved.permissions.as_map().clone(),
            Some(original),
        )
    }
}

impl From<CurrentIdentity> for UserBody {
    fn from(identity: CurrentIdentity) -> Self {
        let original = identity
            .original_principal_id
            .filter(|_| identity.is_impersonating);
        Self::build(
            identity.principal,
            identity.permissions.as_map().clone(),
            original,
        )
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationStarted {
    pub impersonated_user: UserBody,
    pub original_user: UserBody,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpersonationStopped {
    pub original_user: UserBody,
}
