// normalize.rs — Policy normalization and deny-rule validation.
//
// Normalization merges every Acl's rules into canonical form:
//   - one Rule per (interface_name, object_path), ordered lexicographically
//   - one Member per (name, member_type) inside it, ordered the same way
//   - colliding Members have their action masks ORed together
// Peers are never touched. Normalizing twice yields the same policy.
//
// Deny validation checks that every zero-mask Member forms a proper
// "deny everything to these keys" Acl.

use std::collections::BTreeMap;

use crate::error::PolicyError;
use crate::model::{Acl, ActionMask, Member, MemberType, PeerType, Policy, Rule, WILDCARD};

type MemberMap = BTreeMap<(String, MemberType), ActionMask>;
type RuleMap = BTreeMap<(String, String), MemberMap>;

/// Return the canonical form of `policy`.
pub fn normalize_policy(mut policy: Policy) -> Policy {
    policy.normalize();
    policy
}

impl Policy {
    /// Normalize this policy in place. See [`normalize_policy`].
    pub fn normalize(&mut self) {
        let rules_before = self.rule_count();
        let members_before = self.member_count();

        for acl in &mut self.acls {
            normalize_acl(acl);
        }

        tracing::debug!(
            acls = self.acls.len(),
            rules_before,
            rules_after = self.rule_count(),
            members_before,
            members_after = self.member_count(),
            "normalized policy"
        );
    }
}

fn normalize_acl(acl: &mut Acl) {
    let mut merged = RuleMap::new();

    for rule in acl.rules.drain(..) {
        let members = merged
            .entry((rule.interface_name, rule.object_path))
            .or_default();
        for member in rule.members {
            *members
                .entry((member.name, member.member_type))
                .or_insert(ActionMask::DENY) |= member.action_mask;
        }
    }

    acl.rules = merged
        .into_iter()
        .map(|((interface_name, object_path), members)| Rule {
            interface_name,
            object_path,
            members: members
                .into_iter()
                .map(|((name, member_type), action_mask)| Member {
                    name,
                    member_type,
                    action_mask,
                })
                .collect(),
        })
        .collect();
}

/// True when every deny marker in the policy sits in a well-formed deny Acl.
pub fn has_valid_deny_rules(policy: &Policy) -> bool {
    validate_deny_rules(policy).is_ok()
}

/// Check the shape of every deny rule, reporting the first violation.
///
/// An Acl containing a zero-mask Member must:
/// 1. use `*` / `NotSpecified` for that Member,
/// 2. have that Member alone in its Rule,
/// 3. consist of exactly one Rule, on interface `*` and path `*`,
/// 4. name at least one Peer,
/// 5. name only Peers identified by public key.
pub fn validate_deny_rules(policy: &Policy) -> Result<(), PolicyError> {
    for (index, acl) in policy.acls.iter().enumerate() {
        let invalid = |reason: &str| PolicyError::InvalidDenyRule {
            acl: index,
            reason: reason.to_string(),
        };

        let mut deny = false;
        for rule in &acl.rules {
            for member in rule.members.iter().filter(|m| m.action_mask.is_deny()) {
                if member.name != WILDCARD || member.member_type != MemberType::NotSpecified {
                    return Err(invalid(&format!(
                        "deny member must be '*' of unspecified type, found '{}' ({})",
                        member.name, member.member_type
                    )));
                }
                if rule.members.len() != 1 {
                    return Err(invalid("deny rule must contain exactly one member"));
                }
                deny = true;
            }
        }

        if !deny {
            continue;
        }
        if acl.rules.len() != 1 {
            return Err(invalid("deny acl must contain exactly one rule"));
        }
        if !acl.rules[0].is_wildcard() {
            return Err(invalid("deny rule must target interface '*' at path '*'"));
        }
        if acl.peers.is_empty() {
            return Err(invalid("deny acl must name at least one peer"));
        }
        if acl
            .peers
            .iter()
            .any(|peer| peer.peer_type != PeerType::WithPublicKey)
        {
            return Err(invalid("deny acl peers must be identified by public key"));
        }
    }
    Ok(())
}
