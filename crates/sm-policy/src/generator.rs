// generator.rs — Default policy generation.
//
// The default policy grants every member of each managed security group
// full access to everything, then revokes all access for a list of
// explicitly denied application keys. The deny Acl is always present, so
// the generated policy never has zero Acls. With nothing to deny it stays
// empty: a deny rule with no peers would fail deny validation.

use sm_model::{GroupInfo, PublicKey};

use crate::model::{Acl, Member, Peer, Policy, Rule};

/// Version stamped on freshly generated policies.
pub const DEFAULT_POLICY_VERSION: u32 = 1;

/// Build the default policy: one allow-all Acl per group, then one deny
/// Acl listing `denied_keys`.
pub fn default_policy(groups: &[GroupInfo], denied_keys: &[PublicKey]) -> Policy {
    let mut acls: Vec<Acl> = groups
        .iter()
        .map(|group| {
            Acl::new(
                vec![Peer::with_membership(group.guid, group.authority)],
                vec![Rule::wildcard(vec![Member::allow_all()])],
            )
        })
        .collect();

    acls.push(deny_acl(denied_keys));

    tracing::debug!(
        groups = groups.len(),
        denied = denied_keys.len(),
        "generated default policy"
    );

    Policy::new(DEFAULT_POLICY_VERSION, acls)
}

/// The trailing Acl revoking all access for `denied_keys`.
pub fn deny_acl(denied_keys: &[PublicKey]) -> Acl {
    if denied_keys.is_empty() {
        return Acl::new(Vec::new(), Vec::new());
    }
    Acl::new(
        denied_keys.iter().copied().map(Peer::with_public_key).collect(),
        vec![Rule::wildcard(vec![Member::deny_all()])],
    )
}
