//! The permission catalogue.
//!
//! Every permission name the platform understands. A [`crate::PermissionSet`]
//! always carries an entry for each of these.

/// Permission names.
pub mod names {
    pub const SHIFTS_VIEW: &str = "shifts.view";
    pub const SHIFTS_MANAGE: &str = "shifts.manage";
    pub const STAFF_VIEW: &str = "staff.view";
    pub const STAFF_MANAGE: &str = "staff.manage";
    pub const INVOICES_VIEW: &str = "invoices.view";
    pub const INVOICES_MANAGE: &str = "invoices.manage";
    pub const PAYROLL_VIEW: &str = "payroll.view";
    pub const MESSAGES_SEND: &str = "messages.send";
    pub const HIRING_MANAGE: &str = "hiring.manage";
    pub const ANALYTICS_VIEW: &str = "analytics.view";
    pub const FACILITIES_MANAGE: &str = "facilities.manage";

    /// Elevated: may start impersonating another principal.
    pub const USERS_IMPERSONATE: &str = "users.impersonate";

    /// Elevated: may switch its own current role.
    pub const USERS_SWITCH_ROLE: &str = "users.switch_role";
}

/// All known permission names.
pub const CATALOGUE: &[&str] = &[
    names::SHIFTS_VIEW,
    names::SHIFTS_MANAGE,
    names::STAFF_VIEW,
    names::STAFF_MANAGE,
    names::INVOICES_VIEW,
    names::INVOICES_MANAGE,
    names::PAYROLL_VIEW,
    names::MESSAGES_SEND,
    names::HIRING_MANAGE,
    names::ANALYTICS_VIEW,
    names::FACILITIES_MANAGE,
    names::USERS_IMPERSONATE,
    names::USERS_SWITCH_ROLE,
];

/// Whether `name` is in the catalogue.
pub fn is_known_permission(name: &str) -> bool {
    CATALOGUE.contains(&name)
}
