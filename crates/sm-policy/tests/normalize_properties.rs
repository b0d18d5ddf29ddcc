// normalize_properties.rs — Property tests for normalization and deny validation.

use proptest::prelude::*;
use sm_model::{GroupInfo, PublicKey};
use sm_policy::{
    default_policy, has_valid_deny_rules, normalize_policy, Acl, ActionMask, Member, MemberType,
    Peer, Policy, Rule,
};
use uuid::Uuid;

/// Small name pools so that generated policies actually collide.
fn arb_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["*", "Open", "Close", "State"]).prop_map(String::from)
}

fn arb_interface() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["*", "org.example.Door", "org.example.Light"]).prop_map(String::from)
}

fn arb_path() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["*", "/door", "/light/1"]).prop_map(String::from)
}

fn arb_member_type() -> impl Strategy<Value = MemberType> {
    prop::sample::select(vec![
        MemberType::NotSpecified,
        MemberType::Method,
        MemberType::Signal,
        MemberType::Property,
    ])
}

fn arb_member() -> impl Strategy<Value = Member> {
    (arb_name(), arb_member_type(), 0u8..8).prop_map(|(name, member_type, bits)| {
        Member::new(name, member_type, ActionMask::from_bits(bits))
    })
}

fn arb_rule() -> impl Strategy<Value = Rule> {
    (arb_interface(), arb_path(), prop::collection::vec(arb_member(), 0..5))
        .prop_map(|(interface, path, members)| Rule::new(interface, path, members))
}

fn arb_key() -> impl Strategy<Value = PublicKey> {
    (any::<[u8; 32]>(), any::<[u8; 32]>()).prop_map(|(x, y)| PublicKey::new(x, y))
}

fn arb_policy() -> impl Strategy<Value = Policy> {
    prop::collection::vec(
        (
            prop::collection::vec(arb_key().prop_map(Peer::with_public_key), 0..3),
            prop::collection::vec(arb_rule(), 0..6),
        )
            .prop_map(|(peers, rules)| Acl::new(peers, rules)),
        0..4,
    )
    .prop_map(|acls| Policy::new(1, acls))
}

fn arb_group() -> impl Strategy<Value = GroupInfo> {
    (any::<u128>(), arb_key())
        .prop_map(|(id, authority)| GroupInfo::new(Uuid::from_u128(id), authority))
}

/// OR of every mask in `acl` for the given member key.
fn union_mask(
    acl: &Acl,
    interface: &str,
    path: &str,
    name: &str,
    member_type: MemberType,
) -> Option<ActionMask> {
    acl.rules
        .iter()
        .filter(|r| r.interface_name == interface && r.object_path == path)
        .flat_map(|r| r.members.iter())
        .filter(|m| m.name == name && m.member_type == member_type)
        .map(|m| m.action_mask)
        .reduce(|a, b| a | b)
}

proptest! {
    #[test]
    fn normalization_is_idempotent(policy in arb_policy()) {
        let once = normalize_policy(policy);
        let twice = normalize_policy(once.clone());
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn normalization_never_grows(policy in arb_policy()) {
        let normalized = normalize_policy(policy.clone());
        prop_assert_eq!(normalized.acls.len(), policy.acls.len());
        prop_assert!(normalized.rule_count() <= policy.rule_count());
        prop_assert!(normalized.member_count() <= policy.member_count());
    }

    #[test]
    fn merged_masks_are_the_union_of_inputs(policy in arb_policy()) {
        let normalized = normalize_policy(policy.clone());
        for (before, after) in policy.acls.iter().zip(normalized.acls.iter()) {
            for rule in &before.rules {
                for member in &rule.members {
                    let expected = union_mask(
                        before,
                        &rule.interface_name,
                        &rule.object_path,
                        &member.name,
                        member.member_type,
                    );
                    let matching: Vec<&Member> = after
                        .rules
                        .iter()
                        .filter(|r| {
                            r.interface_name == rule.interface_name
                                && r.object_path == rule.object_path
                        })
                        .flat_map(|r| r.members.iter())
                        .filter(|m| m.name == member.name && m.member_type == member.member_type)
                        .collect();
                    prop_assert_eq!(matching.len(), 1);
                    prop_assert_eq!(Some(matching[0].action_mask), expected);
                }
            }
        }
    }

    #[test]
    fn default_policy_always_validates(
        groups in prop::collection::vec(arb_group(), 0..5),
        denied in prop::collection::vec(arb_key(), 0..5),
    ) {
        let policy = default_policy(&groups, &denied);
        prop_assert_eq!(policy.acls.len(), groups.len() + 1);
        prop_assert!(has_valid_deny_rules(&policy));
        prop_assert!(has_valid_deny_rules(&normalize_policy(policy)));
    }

    #[test]
    fn named_deny_member_never_validates(
        name in prop::sample::select(vec!["Open", "Close", "State"]),
        key in arb_key(),
    ) {
        let policy = Policy::new(1, vec![Acl::new(
            vec![Peer::with_public_key(key)],
            vec![Rule::wildcard(vec![Member::new(
                name,
                MemberType::NotSpecified,
                ActionMask::DENY,
            )])],
        )]);
        prop_assert!(!has_valid_deny_rules(&policy));
    }

    #[test]
    fn typed_deny_member_never_validates(
        member_type in prop::sample::select(vec![
            MemberType::Method,
            MemberType::Signal,
            MemberType::Property,
        ]),
        key in arb_key(),
    ) {
        let policy = Policy::new(1, vec![Acl::new(
            vec![Peer::with_public_key(key)],
            vec![Rule::wildcard(vec![Member::new("*", member_type, ActionMask::DENY)])],
        )]);
        prop_assert!(!has_valid_deny_rules(&policy));
    }
}

#[test]
fn two_groups_one_denied_key() {
    let authority = PublicKey::new([0xaa; 32], [0xbb; 32]);
    let g1 = GroupInfo::new(Uuid::new_v4(), authority);
    let g2 = GroupInfo::new(Uuid::new_v4(), authority);
    let denied = PublicKey::new([0x01; 32], [0x02; 32]);

    let policy = default_policy(&[g1, g2], &[denied]);
    assert_eq!(policy.acls.len(), 3);
    assert!(has_valid_deny_rules(&policy));
    // default policies come out of the builder already normalized
    assert_eq!(normalize_policy(policy.clone()), policy);
}
