//! Principals and role names.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::{FacilityId, PrincipalId};

/// A role name as assigned in the credential store.
///
/// Roles are kept exactly as stored; [`Role::canonical`] is the only way
/// to interpret one. A role that has no canonical form is malformed and
/// resolves to no permissions.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(String);

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The role name as stored.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The normalised role name: trimmed and ASCII-lowercased.
    ///
    /// Returns `None` if the result is empty or contains anything other
    /// than `[a-z0-9_]`.
    pub fn canonical(&self) -> Option<String> {
        let name = self.0.trim().to_ascii_lowercase();
        if name.is_empty() {
            return None;
        }
        if !name
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return None;
        }
        Some(name)
    }
}

impl fmt::Debug for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Role({:?})", self.0)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// An identity as recorded in the credential store.
///
/// A `Principal` is a snapshot: it is fetched, read, and dropped. Changing
/// a principal means writing the credential store and fetching again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Credential store identifier.
    pub id: PrincipalId,

    /// Human-readable name.
    pub display_name: String,

    /// The role currently in effect.
    pub role: Role,

    /// The role assigned at provisioning. Role switching never changes it.
    pub home_role: Role,

    /// Facilities this principal is associated with.
    pub facilities: Vec<FacilityId>,

    /// Inactive principals cannot log in or be impersonated.
    pub active: bool,
}

impl Principal {
    /// Create an active principal whose current and home roles are `role`.
    pub fn new(id: PrincipalId, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            home_role: role.clone(),
            role,
            facilities: Vec::new(),
            active: true,
        }
    }

    /// Set the facility associations.
    pub fn with_facilities(mut self, facilities: impl IntoIterator<Item = FacilityId>) -> Self {
        self.facilities = facilities.into_iter().collect();
        self
    }

    /// Mark the principal inactive.
    pub fn deactivated(mut self) -> Self {
        self.active = false;
        self
    }

    /// A copy of this snapshot with a different current role.
    pub fn with_role(&self, role: Role) -> Self {
        Self {
            role,
            ..self.clone()
        }
    }

    /// Whether this principal is associated with `facility`.
    pub fn is_associated_with(&self, facility: FacilityId) -> bool {
        self.facilities.contains(&facility)
    }
}
