// application.rs — ApplicationInfo: a managed application as the manager sees it.
//
// The claim state follows the application's own security state machine:
//   Unknown → (anything, once the first announcement arrives)
//   Unclaimable ↔ Claimable → Claimed → Claimable (after a reset)
// Any state may drop back to Unknown when the application goes offline.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModelError;
use crate::key::PublicKey;

/// Claim state of a managed application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimState {
    /// The application refuses to be claimed.
    Unclaimable,
    /// The application is waiting for an owner.
    Claimable,
    /// The application has an owner.
    Claimed,
    /// Nothing heard from the application yet.
    #[default]
    Unknown,
}

impl fmt::Display for ClaimState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClaimState::Unclaimable => write!(f, "unclaimable"),
            ClaimState::Claimable => write!(f, "claimable"),
            ClaimState::Claimed => write!(f, "claimed"),
            ClaimState::Unknown => write!(f, "unknown"),
        }
    }
}

impl ClaimState {
    /// Check whether moving from this state to `next` is valid.
    ///
    /// Re-announcing the current state is always accepted, as is
    /// falling back to `Unknown`.
    pub fn can_transition_to(&self, next: ClaimState) -> bool {
        if *self == next || next == ClaimState::Unknown {
            return true;
        }

        matches!(
            (self, next),
            (ClaimState::Unknown, _)
                | (ClaimState::Unclaimable, ClaimState::Claimable)
                | (ClaimState::Claimable, ClaimState::Unclaimable)
                | (ClaimState::Claimable, ClaimState::Claimed)
                // A reset returns a claimed application to the factory state.
                | (ClaimState::Claimed, ClaimState::Claimable)
        )
    }
}

/// Whether the application process is currently up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunningState {
    #[default]
    Unknown,
    NotRunning,
    Running,
}

impl fmt::Display for RunningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunningState::Unknown => write!(f, "unknown"),
            RunningState::NotRunning => write!(f, "not_running"),
            RunningState::Running => write!(f, "running"),
        }
    }
}

/// Everything the manager knows about one application.
///
/// Identity is the public key: two `ApplicationInfo` values describe the
/// same application exactly when their keys are equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationInfo {
    /// The application's public key (primary identity).
    pub public_key: PublicKey,

    /// Bus name the application is reachable on; empty when offline.
    #[serde(default)]
    pub bus_name: String,

    /// Name assigned by the administrator.
    #[serde(default)]
    pub user_defined_name: String,

    /// Name of the device hosting the application.
    #[serde(default)]
    pub device_name: String,

    /// Name the application announces for itself.
    #[serde(default)]
    pub app_name: String,

    /// 128-bit peer identifier.
    pub peer_id: Uuid,

    /// Keys of the managers this application trusts.
    #[serde(default)]
    pub roots_of_trust: Vec<PublicKey>,

    /// Key identifier announced by the application, if any. Used as the
    /// certificate subject common name when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_identifier: Option<Vec<u8>>,

    pub claim_state: ClaimState,
    pub running_state: RunningState,
}

impl ApplicationInfo {
    /// A freshly discovered application: no names, nil peer id, both
    /// states unknown.
    pub fn new(public_key: PublicKey) -> Self {
        Self {
            public_key,
            bus_name: String::new(),
            user_defined_name: String::new(),
            device_name: String::new(),
            app_name: String::new(),
            peer_id: Uuid::nil(),
            roots_of_trust: Vec::new(),
            key_identifier: None,
            claim_state: ClaimState::Unknown,
            running_state: RunningState::Unknown,
        }
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }

    pub fn with_user_defined_name(mut self, name: impl Into<String>) -> Self {
        self.user_defined_name = name.into();
        self
    }

    pub fn with_peer_id(mut self, peer_id: Uuid) -> Self {
        self.peer_id = peer_id;
        self
    }

    pub fn with_bus_name(mut self, bus_name: impl Into<String>) -> Self {
        self.bus_name = bus_name.into();
        self
    }

    pub fn with_claim_state(mut self, state: ClaimState) -> Self {
        self.claim_state = state;
        self
    }

    pub fn with_key_identifier(mut self, key_id: Vec<u8>) -> Self {
        self.key_identifier = Some(key_id);
        self
    }

    /// True when the application currently has a bus name.
    pub fn is_online(&self) -> bool {
        !self.bus_name.is_empty()
    }

    /// The announced key identifier, ignoring an empty one.
    pub fn announced_key_identifier(&self) -> Option<&[u8]> {
        self.key_identifier
            .as_deref()
            .filter(|key_id| !key_id.is_empty())
    }

    /// Guard run before a claim is attempted.
    pub fn check_claimable(&self) -> Result<(), ModelError> {
        match self.claim_state {
            ClaimState::Claimable => Ok(()),
            ClaimState::Claimed => Err(ModelError::AlreadyClaimed {
                key: self.public_key.to_string(),
            }),
            state @ (ClaimState::Unclaimable | ClaimState::Unknown) => {
                Err(ModelError::NotClaimable {
                    key: self.public_key.to_string(),
                    state: state.to_string(),
                })
            }
        }
    }

    /// Move to a new claim state, enforcing the state machine.
    pub fn transition_claim_state(&mut self, next: ClaimState) -> Result<(), ModelError> {
        if !self.claim_state.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                key: self.public_key.to_string(),
                from: self.claim_state.to_string(),
                to: next.to_string(),
            });
        }
        self.claim_state = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_app() -> ApplicationInfo {
        ApplicationInfo::new(PublicKey::new([1; 32], [2; 32]))
            .with_app_name("thermostat")
            .with_device_name("kitchen")
            .with_peer_id(Uuid::new_v4())
    }

    #[test]
    fn new_app_is_unknown_and_offline() {
        let app = ApplicationInfo::new(PublicKey::default());
        assert_eq!(app.claim_state, ClaimState::Unknown);
        assert_eq!(app.running_state, RunningState::Unknown);
        assert!(app.peer_id.is_nil());
        assert!(!app.is_online());
    }

    #[test]
    fn claim_lifecycle() {
        let mut app = test_app();
        app.transition_claim_state(ClaimState::Claimable).unwrap();
        app.check_claimable().unwrap();
        app.transition_claim_state(ClaimState::Claimed).unwrap();
        app.transition_claim_state(ClaimState::Claimable).unwrap();
        assert_eq!(app.claim_state, ClaimState::Claimable);
    }

    #[test]
    fn unclaimable_cannot_jump_to_claimed() {
        let mut app = test_app().with_claim_state(ClaimState::Unclaimable);
        let result = app.transition_claim_state(ClaimState::Claimed);
        assert!(matches!(result, Err(ModelError::InvalidTransition { .. })));
        // a refused transition leaves the state as it was
        assert_eq!(app.claim_state, ClaimState::Unclaimable);
    }

    #[test]
    fn any_state_can_fall_back_to_unknown() {
        for state in [
            ClaimState::Unclaimable,
            ClaimState::Claimable,
            ClaimState::Claimed,
        ] {
            assert!(state.can_transition_to(ClaimState::Unknown));
        }
    }

    #[test]
    fn check_claimable_refuses_claimed_app() {
        let app = test_app().with_claim_state(ClaimState::Claimed);
        let err = app.check_claimable().unwrap_err();
        assert!(matches!(err, ModelError::AlreadyClaimed { .. }));
        assert_eq!(err.kind(), crate::ErrorKind::AlreadyClaimed);
    }

    #[test]
    fn check_claimable_refuses_unknown_and_unclaimable() {
        for state in [ClaimState::Unknown, ClaimState::Unclaimable] {
            let app = test_app().with_claim_state(state);
            let err = app.check_claimable().unwrap_err();
            assert_eq!(err.kind(), crate::ErrorKind::NotClaimable);
        }
    }

    #[test]
    fn empty_key_identifier_is_ignored() {
        let app = test_app().with_key_identifier(Vec::new());
        assert!(app.announced_key_identifier().is_none());
        let app = test_app().with_key_identifier(vec![7, 7]);
        assert_eq!(app.announced_key_identifier(), Some(&[7u8, 7][..]));
    }

    #[test]
    fn application_serialization_round_trip() {
        let app = test_app()
            .with_claim_state(ClaimState::Claimed)
            .with_key_identifier(vec![1, 2, 3]);
        let json = serde_json::to_string(&app).unwrap();
        assert!(json.contains("\"claim_state\":\"claimed\""));
        let restored: ApplicationInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, app);
    }
}
