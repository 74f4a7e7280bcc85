//! Property-based tests for CardHub domain models
//!
//! Universal properties of code derivation, template field ordering, pagination
//! and the access policy.

use proptest::prelude::*;
use uuid::Uuid;

use crate::{
    code_with_suffix, derive_code, is_valid_code, normalize_fields, CardSide, FieldType,
    OrganizationRef, PageRequest, Principal, Resource, Role, Scope, TemplateField, MAX_LIMIT,
};

prop_compose! {
    fn arb_uuid()(bytes in prop::array::uniform16(0u8..)) -> Uuid {
        Uuid::from_bytes(bytes)
    }
}

fn arb_side() -> impl Strategy<Value = CardSide> {
    prop_oneof![Just(CardSide::Front), Just(CardSide::Back)]
}

fn arb_role() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Owner),
        Just(Role::Agent),
        Just(Role::Admin),
        Just(Role::Staff),
    ]
}

prop_compose! {
    fn arb_field()(
        key in "[a-z][a-z0-9_]{0,15}",
        side in arb_side(),
        position in 0u32..50,
        required in any::<bool>(),
    ) -> TemplateField {
        TemplateField {
            label: key.to_uppercase(),
            key,
            field_type: FieldType::Text,
            side,
            position,
            required,
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Any organization name yields a usable card-number code.
    #[test]
    fn prop_derived_code_is_valid(name in "\\PC{0,60}") {
        let code = derive_code(&name);
        prop_assert!(is_valid_code(&code), "derived {:?} from {:?}", code, name);
    }

    /// Collision suffixes never push a code past its length limit.
    #[test]
    fn prop_suffixed_code_is_valid(name in "[A-Za-z ]{0,40}", attempt in 0u32..100_000) {
        let code = code_with_suffix(&derive_code(&name), attempt);
        prop_assert!(is_valid_code(&code), "suffixed {:?}", code);
    }

    /// Normalization keeps every field, puts the front first and numbers each side 0..n.
    #[test]
    fn prop_normalize_fields(mut fields in prop::collection::vec(arb_field(), 0..20)) {
        let mut keys_before: Vec<String> = fields.iter().map(|f| f.key.clone()).collect();
        normalize_fields(&mut fields);
        let mut keys_after: Vec<String> = fields.iter().map(|f| f.key.clone()).collect();
        keys_before.sort();
        keys_after.sort();
        prop_assert_eq!(keys_before, keys_after);

        let first_back = fields.iter().position(|f| f.side == CardSide::Back).unwrap_or(fields.len());
        prop_assert!(fields[first_back..].iter().all(|f| f.side == CardSide::Back));

        for side in [CardSide::Front, CardSide::Back] {
            let positions: Vec<u32> = fields.iter().filter(|f| f.side == side).map(|f| f.position).collect();
            let expected: Vec<u32> = (0..positions.len() as u32).collect();
            prop_assert_eq!(positions, expected);
        }
    }

    /// Normalizing twice is the same as normalizing once.
    #[test]
    fn prop_normalize_is_idempotent(mut fields in prop::collection::vec(arb_field(), 0..20)) {
        normalize_fields(&mut fields);
        let once = fields.clone();
        normalize_fields(&mut fields);
        prop_assert_eq!(once, fields);
    }

    #[test]
    fn prop_page_bounds(page in proptest::option::of(any::<i64>()), limit in proptest::option::of(any::<i64>())) {
        let request = PageRequest { page, limit };
        prop_assert!(request.page() >= 1);
        prop_assert!((1..=MAX_LIMIT).contains(&request.limit()));
        prop_assert!(request.offset() >= 0);
    }

    /// An organization the caller may act in always falls inside the caller's
    /// organization-level scope.
    #[test]
    fn prop_act_in_implies_visible(
        role in arb_role(),
        user_id in arb_uuid(),
        org_id in arb_uuid(),
        agent_id in proptest::option::of(arb_uuid()),
    ) {
        let org = OrganizationRef { id: org_id, agent_id };
        let principal = Principal::new(
            user_id,
            role,
            role.is_organization_member().then_some(org_id),
        );
        if principal.can_act_in(&org) {
            let visible = match principal.scope(Resource::Templates) {
                Scope::All => true,
                Scope::AgentOrganizations(agent) => org.agent_id == Some(agent),
                Scope::Organization(id) => id == org.id,
                Scope::CreatedBy { .. } | Scope::Record(_) => false,
            };
            prop_assert!(visible, "{:?} may act in {:?} but cannot see it", role, org);
        }
    }
}
