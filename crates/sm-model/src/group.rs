// group.rs — Security groups and user identities managed by the authority.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::key::PublicKey;

/// A security group. Membership certificates reference the group by `guid`.
///
/// `(authority, guid)` is the primary key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub guid: Uuid,
    /// Key of the security manager that owns the group.
    pub authority: PublicKey,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

impl GroupInfo {
    pub fn new(guid: Uuid, authority: PublicKey) -> Self {
        Self {
            guid,
            authority,
            name: String::new(),
            description: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// A user identity that identity certificates are issued for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityInfo {
    pub guid: Uuid,
    pub authority: PublicKey,
    #[serde(default)]
    pub name: String,
}

impl IdentityInfo {
    pub fn new(guid: Uuid, authority: PublicKey) -> Self {
        Self {
            guid,
            authority,
            name: String::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}
