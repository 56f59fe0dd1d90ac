//! Proptest generators for property-based testing.

use proptest::prelude::*;

use rollcall_core::{PrincipalId, Role};

use crate::fixtures::cast;

/// Any principal id, including ones nobody uses.
pub fn principal_id() -> impl Strategy<Value = PrincipalId> {
    any::<u64>().prop_map(PrincipalId)
}

/// An id from the seeded cast, or one nobody uses.
pub fn cast_id() -> impl Strategy<Value = PrincipalId> {
    prop_oneof![
        Just(cast::ADMIN),
        Just(cast::STAFF),
        Just(cast::CLERK),
        Just(cast::INACTIVE),
        Just(cast::TARGET),
        Just(cast::MANAGER),
        Just(cast::NOBODY),
    ]
}

/// A built-in role name, possibly with stray case and whitespace.
pub fn known_role() -> impl Strategy<Value = Role> {
    (
        prop_oneof![
            Just("super_admin"),
            Just("admin"),
            Just("facility_manager"),
            Just("scheduler"),
            Just("billing"),
            Just("staff"),
        ],
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(name, upper, padded)| {
            let name = if upper {
                name.to_ascii_uppercase()
            } else {
                name.to_string()
            };
            if padded {
                Role::new(format!("  {} ", name))
            } else {
                Role::new(name)
            }
        })
}

/// Arbitrary role strings, mostly malformed or unknown.
pub fn any_role() -> impl Strategy<Value = Role> {
    prop_oneof![known_role(), ".{0,24}".prop_map(|s| Role::new(s))]
}

/// One client action against a single session.
#[derive(Debug, Clone)]
pub enum IdentityOp {
    /// Log in as a cast member, replacing the current session.
    Login(&'static str),
    Logout,
    Start(PrincipalId),
    Stop,
    SwitchRole(Role),
    Read,
}

impl Arbitrary for IdentityOp {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            1 => prop_oneof![Just("ada"), Just("carl"), Just("nina"), Just("ivy")]
                .prop_map(IdentityOp::Login),
            1 => Just(IdentityOp::Logout),
            4 => cast_id().prop_map(IdentityOp::Start),
            3 => Just(IdentityOp::Stop),
            2 => any_role().prop_map(IdentityOp::SwitchRole),
            2 => Just(IdentityOp::Read),
        ]
        .boxed()
    }
}

/// A sequence of operations that starts with a login.
pub fn op_sequence(max_len: usize) -> impl Strategy<Value = Vec<IdentityOp>> {
    prop::collection::vec(any::<IdentityOp>(), 0..=max_len).prop_map(|mut ops| {
        ops.insert(0, IdentityOp::Login("ada"));
        ops
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollcall_perms::PermissionResolver;

    proptest! {
        #[test]
        fn test_known_roles_resolve(role in known_role()) {
            let resolver = PermissionResolver::with_builtin_roles();
            prop_assert!(resolver.is_known_role(&role));
        }

        #[test]
        fn test_sequences_start_with_login(ops in op_sequence(10)) {
            prop_assert!(matches!(ops[0], IdentityOp::Login("ada")));
            prop_assert!(ops.len() <= 11);
        }
    }
}
