// model.rs — Policy documents: Acls of Peers and Rules of Members.
//
// A policy is an ordered list of Acls. Each Acl says *who* (Peers) may do
// *what* (Rules). A Rule scopes an interface and object path; its Members
// name methods, signals, and properties together with the actions granted
// on them. A zero action mask is the deny marker.

use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Serialize};
use sm_model::PublicKey;
use uuid::Uuid;

/// Wildcard used for interface names, object paths, and member names.
pub const WILDCARD: &str = "*";

/// Bitset of actions a Member grants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionMask(u8);

impl ActionMask {
    /// No actions at all; marks a deny rule.
    pub const DENY: ActionMask = ActionMask(0);
    pub const PROVIDE: ActionMask = ActionMask(0x01);
    pub const OBSERVE: ActionMask = ActionMask(0x02);
    pub const MODIFY: ActionMask = ActionMask(0x04);
    pub const ALL: ActionMask = ActionMask(0x07);

    pub fn from_bits(bits: u8) -> Self {
        ActionMask(bits)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_deny(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, other: ActionMask) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ActionMask {
    type Output = ActionMask;

    fn bitor(self, rhs: ActionMask) -> ActionMask {
        ActionMask(self.0 | rhs.0)
    }
}

impl BitOrAssign for ActionMask {
    fn bitor_assign(&mut self, rhs: ActionMask) {
        self.0 |= rhs.0;
    }
}

/// Kind of interface member a rule applies to.
///
/// Variant order defines the normalization order:
/// `NotSpecified < Method < Signal < Property`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemberType {
    #[default]
    NotSpecified,
    Method,
    Signal,
    Property,
}

impl fmt::Display for MemberType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberType::NotSpecified => write!(f, "not_specified"),
            MemberType::Method => write!(f, "method"),
            MemberType::Signal => write!(f, "signal"),
            MemberType::Property => write!(f, "property"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub name: String,
    pub member_type: MemberType,
    pub action_mask: ActionMask,
}

impl Member {
    pub fn new(name: impl Into<String>, member_type: MemberType, action_mask: ActionMask) -> Self {
        Self {
            name: name.into(),
            member_type,
            action_mask,
        }
    }

    /// `*`, any member type, no actions.
    pub fn deny_all() -> Self {
        Self::new(WILDCARD, MemberType::NotSpecified, ActionMask::DENY)
    }

    /// `*`, any member type, every action.
    pub fn allow_all() -> Self {
        Self::new(WILDCARD, MemberType::NotSpecified, ActionMask::ALL)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub interface_name: String,
    pub object_path: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Rule {
    pub fn new(
        interface_name: impl Into<String>,
        object_path: impl Into<String>,
        members: Vec<Member>,
    ) -> Self {
        Self {
            interface_name: interface_name.into(),
            object_path: object_path.into(),
            members,
        }
    }

    /// A rule on every interface at every path.
    pub fn wildcard(members: Vec<Member>) -> Self {
        Self::new(WILDCARD, WILDCARD, members)
    }

    pub fn is_wildcard(&self) -> bool {
        self.interface_name == WILDCARD && self.object_path == WILDCARD
    }
}

/// How a Peer is identified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerType {
    /// Every peer, authenticated or not.
    All,
    /// Any peer the application trusts.
    AnyTrusted,
    /// Peers holding a certificate issued by the given authority.
    FromCertificateAuthority,
    /// One specific peer, identified by its public key.
    WithPublicKey,
    /// Members of a security group.
    WithMembership,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub peer_type: PeerType,
    /// The peer's key, or the group authority for `WithMembership`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKey>,
    /// Group guid for `WithMembership` peers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<Uuid>,
}

impl Peer {
    pub fn any_trusted() -> Self {
        Self {
            peer_type: PeerType::AnyTrusted,
            public_key: None,
            group_id: None,
        }
    }

    pub fn with_public_key(key: PublicKey) -> Self {
        Self {
            peer_type: PeerType::WithPublicKey,
            public_key: Some(key),
            group_id: None,
        }
    }

    pub fn with_membership(group_id: Uuid, authority: PublicKey) -> Self {
        Self {
            peer_type: PeerType::WithMembership,
            public_key: Some(authority),
            group_id: Some(group_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acl {
    pub peers: Vec<Peer>,
    pub rules: Vec<Rule>,
}

impl Acl {
    pub fn new(peers: Vec<Peer>, rules: Vec<Rule>) -> Self {
        Self { peers, rules }
    }
}

/// A policy document, as generated, normalized, and transmitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Monotonic serial of the policy; applications refuse older versions.
    pub version: u32,
    #[serde(default)]
    pub acls: Vec<Acl>,
}

impl Policy {
    pub fn new(version: u32, acls: Vec<Acl>) -> Self {
        Self { version, acls }
    }

    /// Total number of rules across all Acls.
    pub fn rule_count(&self) -> usize {
        self.acls.iter().map(|acl| acl.rules.len()).sum()
    }

    /// Total number of members across all rules.
    pub fn member_count(&self) -> usize {
        self.acls
            .iter()
            .flat_map(|acl| acl.rules.iter())
            .map(|rule| rule.members.len())
            .sum()
    }
}
