//! Role templates: the static role → permissions table.

use std::collections::BTreeSet;

use rollcall_core::Role;

use crate::catalogue::{is_known_permission, names, CATALOGUE};
use crate::error::{PermsError, Result};

/// Whether a role's grants depend on facility associations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleScope {
    /// Grants apply everywhere.
    Global,
    /// Grants apply only within facilities the principal is associated with.
    Facility,
}

/// The permissions a role grants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleTemplate {
    name: String,
    scope: RoleScope,
    grants: BTreeSet<&'static str>,
}

impl RoleTemplate {
    /// Build a template, checking the role name and every granted permission.
    pub fn new<I, S>(name: &str, scope: RoleScope, grants: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let canonical = Role::from(name)
            .canonical()
            .ok_or_else(|| PermsError::MalformedRole(name.to_string()))?;

        let mut set = BTreeSet::new();
        for grant in grants {
            let grant = grant.as_ref();
            let known = CATALOGUE
                .iter()
                .copied()
                .find(|&n| n == grant)
                .ok_or_else(|| PermsError::UnknownPermission(grant.to_string()))?;
            set.insert(known);
        }

        Ok(Self {
            name: canonical,
            scope,
            grants: set,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> RoleScope {
        self.scope
    }

    /// Whether this template grants `permission`.
    pub fn grants(&self, permission: &str) -> bool {
        self.grants.contains(permission)
    }

    pub fn granted(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.grants.iter().copied()
    }

    /// The roles every deployment starts with.
    pub fn builtin() -> Vec<RoleTemplate> {
        use names::*;

        let everything: Vec<&'static str> = CATALOGUE.to_vec();
        let admin: Vec<&'static str> = CATALOGUE
            .iter()
            .copied()
            .filter(|&n| n != USERS_IMPERSONATE && n != USERS_SWITCH_ROLE)
            .collect();

        vec![
            builtin("super_admin", RoleScope::Global, &everything),
            builtin("admin", RoleScope::Global, &admin),
            builtin(
                "facility_manager",
                RoleScope::Facility,
                &[
                    SHIFTS_VIEW,
                    SHIFTS_MANAGE,
                    STAFF_VIEW,
                    STAFF_MANAGE,
                    INVOICES_VIEW,
                    MESSAGES_SEND,
                    HIRING_MANAGE,
                    ANALYTICS_VIEW,
                ],
            ),
            builtin(
                "scheduler",
                RoleScope::Facility,
                &[SHIFTS_VIEW, SHIFTS_MANAGE, STAFF_VIEW, MESSAGES_SEND],
            ),
            builtin(
                "billing",
                RoleScope::Global,
                &[INVOICES_VIEW, INVOICES_MANAGE, PAYROLL_VIEW, ANALYTICS_VIEW],
            ),
            builtin("staff", RoleScope::Global, &[SHIFTS_VIEW, MESSAGES_SEND]),
        ]
    }
}

fn builtin(name: &str, scope: RoleScope, grants: &[&'static str]) -> RoleTemplate {
    debug_assert!(grants.iter().all(|g| is_known_permission(g)));
    RoleTemplate {
        name: name.to_string(),
        scope,
        grants: grants.iter().copied().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_unknown_permission() {
        let err = RoleTemplate::new("auditor", RoleScope::Global, ["invoices.view", "root"]);
        assert!(matches!(err, Err(PermsError::UnknownPermission(p)) if p == "root"));
    }

    #[test]
    fn test_new_rejects_malformed_name() {
        let err = RoleTemplate::new("bad role!", RoleScope::Global, ["invoices.view"]);
        assert!(matches!(err, Err(PermsError::MalformedRole(_))));
    }

    #[test]
    fn test_new_canonicalises_name() {
        let t = RoleTemplate::new(" Auditor ", RoleScope::Global, ["analytics.view"]).unwrap();
        assert_eq!(t.name(), "auditor");
        assert!(t.grants("analytics.view"));
        assert!(!t.grants("invoices.view"));
    }

    #[test]
    fn test_only_super_admin_is_elevated() {
        for t in RoleTemplate::builtin() {
            let elevated = t.grants(names::USERS_IMPERSONATE);
            assert_eq!(elevated, t.name() == "super_admin", "{}", t.name());
            assert_eq!(t.grants(names::USERS_SWITCH_ROLE), elevated);
        }
    }
}
