//! Permission resolution.
//!
//! [`PermissionResolver::resolve`] is the one place a role becomes a
//! [`PermissionSet`]. It is pure: the same role and facility context always
//! produce the same set, and it never fails.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use rollcall_core::{FacilityId, Principal, Role};

use crate::catalogue::CATALOGUE;
use crate::error::{PermsError, Result};
use crate::template::{RoleScope, RoleTemplate};

/// Resolved permissions: every catalogue name mapped to granted or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(BTreeMap<String, bool>);

impl PermissionSet {
    /// A set that grants nothing.
    pub fn empty() -> Self {
        Self(CATALOGUE.iter().map(|&n| (n.to_string(), false)).collect())
    }

    fn from_template(template: &RoleTemplate) -> Self {
        let mut set = Self::empty();
        for name in template.granted() {
            set.0.insert(name.to_string(), true);
        }
        set
    }

    /// Whether `permission` is granted. Unknown names are never granted.
    pub fn grants(&self, permission: &str) -> bool {
        self.0.get(permission).copied().unwrap_or(false)
    }

    /// Iterate over granted permission names.
    pub fn granted(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, granted)| **granted)
            .map(|(name, _)| name.as_str())
    }

    pub fn grants_nothing(&self) -> bool {
        self.0.values().all(|granted| !granted)
    }

    pub fn as_map(&self) -> &BTreeMap<String, bool> {
        &self.0
    }
}

/// Facility information used to resolve facility-scoped roles.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FacilityContext {
    /// Facilities the principal is associated with.
    pub associations: Vec<FacilityId>,

    /// The facility being acted in, if the request names one.
    pub requested: Option<FacilityId>,
}

impl FacilityContext {
    /// The context for a principal acting without naming a facility.
    pub fn for_principal(principal: &Principal) -> Self {
        Self {
            associations: principal.facilities.clone(),
            requested: None,
        }
    }

    /// Narrow to one facility.
    pub fn in_facility(mut self, facility: FacilityId) -> Self {
        self.requested = Some(facility);
        self
    }

    /// Whether a facility-scoped grant applies in this context.
    fn admits(&self) -> bool {
        match self.requested {
            Some(facility) => self.associations.contains(&facility),
            None => !self.associations.is_empty(),
        }
    }
}

/// Maps roles to permission sets.
#[derive(Debug, Clone)]
pub struct PermissionResolver {
    templates: HashMap<String, RoleTemplate>,
}

impl PermissionResolver {
    /// A resolver that knows no roles; everything resolves empty.
    pub fn new() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    /// A resolver preloaded with [`RoleTemplate::builtin`].
    pub fn with_builtin_roles() -> Self {
        let mut resolver = Self::new();
        for template in RoleTemplate::builtin() {
            resolver
                .templates
                .insert(template.name().to_string(), template);
        }
        resolver
    }

    /// Register an additional role.
    pub fn register(&mut self, template: RoleTemplate) -> Result<()> {
        if self.templates.contains_key(template.name()) {
            return Err(PermsError::DuplicateRole(template.name().to_string()));
        }
        self.templates
            .insert(template.name().to_string(), template);
        Ok(())
    }

    fn template(&self, role: &Role) -> Option<&RoleTemplate> {
        let canonical = role.canonical()?;
        self.templates.get(&canonical)
    }

    /// Whether `role` names a registered role.
    pub fn is_known_role(&self, role: &Role) -> bool {
        self.template(role).is_some()
    }

    /// Resolve `role` to a permission set.
    ///
    /// Unknown and malformed roles resolve empty. Facility-scoped roles
    /// resolve empty unless `facility` admits them.
    pub fn resolve(&self, role: &Role, facility: Option<&FacilityContext>) -> PermissionSet {
        let Some(template) = self.template(role) else {
            tracing::debug!(role = %role, "unknown or malformed role resolves to no permissions");
            return PermissionSet::empty();
        };

        match template.scope() {
            RoleScope::Global => PermissionSet::from_template(template),
            RoleScope::Facility => match facility {
                Some(ctx) if ctx.admits() => PermissionSet::from_template(template),
                _ => PermissionSet::empty(),
            },
        }
    }

    /// Resolve a principal's current role in its own facility context.
    pub fn resolve_principal(&self, principal: &Principal) -> PermissionSet {
        self.resolve(
            &principal.role,
            Some(&FacilityContext::for_principal(principal)),
        )
    }

    /// Whether `role` carries `capability`, ignoring facility scope.
    ///
    /// Used for elevated capabilities, which only global roles carry.
    pub fn has_capability(&self, role: &Role, capability: &str) -> bool {
        match self.template(role) {
            Some(t) if t.scope() == RoleScope::Global => t.grants(capability),
            _ => false,
        }
    }
}

impl Default for PermissionResolver {
    fn default() -> Self {
        Self::with_builtin_roles()
    }
}
