// end_to_end.rs — Claim an application, synchronize it, and check what
// reached the device and what was recorded.

use std::sync::{Arc, Mutex};

use sm_cert::{
    get_group_id, verify_signature, Certificate, CertificateType, EcdsaSigner, Signer,
};
use sm_model::{ApplicationInfo, ClaimState, GroupInfo, IdentityInfo, PublicKey};
use sm_policy::{
    has_valid_deny_rules, ActionMask, JsonPolicyMarshaller, PeerType, Policy, PolicyMarshaller,
};
use sm_storage::{SqlStorage, Storage, StorageConfig};
use sm_sync::{
    ChannelError, ManagerConfig, SecurityChannel, SyncErrorType, SyncPlan, Synchronizer,
};
use tempfile::tempdir;
use uuid::Uuid;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Stands in for the remote application: keeps whatever it is sent.
#[derive(Default)]
struct Device {
    identity: Mutex<Option<Certificate>>,
    memberships: Mutex<Vec<Certificate>>,
    policy: Mutex<Option<Vec<u8>>>,
    refuse_policy: bool,
}

impl Device {
    fn installed_policy(&self) -> Policy {
        let bytes = self.policy.lock().unwrap().clone().unwrap();
        JsonPolicyMarshaller.import(&bytes).unwrap()
    }
}

impl SecurityChannel for Device {
    fn claim(&self, _: &ApplicationInfo, _: &PublicKey) -> Result<(), ChannelError> {
        Ok(())
    }

    fn install_identity(
        &self,
        _: &ApplicationInfo,
        cert: &Certificate,
    ) -> Result<(), ChannelError> {
        *self.identity.lock().unwrap() = Some(cert.clone());
        Ok(())
    }

    fn install_membership(
        &self,
        _: &ApplicationInfo,
        cert: &Certificate,
    ) -> Result<(), ChannelError> {
        self.memberships.lock().unwrap().push(cert.clone());
        Ok(())
    }

    fn remove_membership(
        &self,
        _: &ApplicationInfo,
        serial: &[u8],
        issuer: &PublicKey,
    ) -> Result<(), ChannelError> {
        let mut memberships = self.memberships.lock().unwrap();
        let before = memberships.len();
        memberships.retain(|c| {
            !(c.serial_number == serial && c.issuer_public_key.as_ref() == Some(issuer))
        });
        if memberships.len() == before {
            return Err(ChannelError::new("no such membership"));
        }
        Ok(())
    }

    fn update_policy(&self, _: &ApplicationInfo, policy: &[u8]) -> Result<(), ChannelError> {
        if self.refuse_policy {
            return Err(ChannelError::new("policy rejected"));
        }
        *self.policy.lock().unwrap() = Some(policy.to_vec());
        Ok(())
    }

    fn reset(&self, _: &ApplicationInfo) -> Result<(), ChannelError> {
        *self.identity.lock().unwrap() = None;
        self.memberships.lock().unwrap().clear();
        *self.policy.lock().unwrap() = None;
        Ok(())
    }
}

fn new_app() -> ApplicationInfo {
    ApplicationInfo::new(EcdsaSigner::generate().unwrap().public_key())
        .with_app_name("door-lock")
        .with_device_name("front-door")
        .with_peer_id(Uuid::new_v4())
        .with_claim_state(ClaimState::Claimable)
}

#[test]
fn claim_then_sync_two_groups_and_a_denied_key() {
    init_tracing();
    let dir = tempdir().unwrap();
    let config = ManagerConfig {
        issuer_name: "building-7".into(),
        storage: StorageConfig::with_path(dir.path().join("fleet.db")),
        ..ManagerConfig::default()
    };
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let sync = Synchronizer::open(config, authority.clone()).unwrap();
    let device = Device::default();

    let admin = IdentityInfo::new(Uuid::new_v4(), authority.public_key()).with_name("admin");
    let app = sync.claim_application(&new_app(), &admin, &device).unwrap();

    let staff = GroupInfo::new(Uuid::new_v4(), authority.public_key()).with_name("staff");
    let guests = GroupInfo::new(Uuid::new_v4(), authority.public_key()).with_name("guests");
    let revoked = PublicKey::new([0xAB; 32], [0xCD; 32]);
    let plan = SyncPlan::new()
        .with_identity(admin)
        .with_group(staff.clone())
        .with_group(guests.clone())
        .with_denied_key(revoked);

    let errors = sync.sync_application(&app, &plan, &device);
    assert!(errors.is_empty(), "unexpected errors: {errors:?}");

    // what the device received
    let memberships = device.memberships.lock().unwrap().clone();
    let group_ids: Vec<Uuid> = memberships
        .iter()
        .map(|c| get_group_id(&c.encoded).unwrap())
        .collect();
    assert_eq!(group_ids, vec![staff.guid, guests.guid]);
    for cert in &memberships {
        verify_signature(cert, &authority.public_key()).unwrap();
        assert_eq!(cert.issuer_name, "building-7");
    }

    let policy = device.installed_policy();
    assert_eq!(policy.version, 1);
    assert_eq!(policy.acls.len(), 3);
    assert!(has_valid_deny_rules(&policy));
    let deny = policy.acls.last().unwrap();
    assert_eq!(deny.peers[0].peer_type, PeerType::WithPublicKey);
    assert_eq!(deny.peers[0].public_key, Some(revoked));
    assert_eq!(deny.rules[0].members[0].action_mask, ActionMask::DENY);

    // what was recorded
    let storage: &SqlStorage = sync.storage();
    let stored = storage.get_membership_certificates(&app.public_key).unwrap();
    let stored_serials: Vec<&[u8]> = stored.iter().map(|c| c.serial_number.as_slice()).collect();
    let sent_serials: Vec<&[u8]> = memberships
        .iter()
        .map(|c| c.serial_number.as_slice())
        .collect();
    assert_eq!(stored_serials, sent_serials);
    assert!(stored
        .iter()
        .all(|c| c.issuer_public_key == Some(authority.public_key())));
    assert_eq!(sync.installed_policy(&app.public_key).unwrap(), policy);
    let identity = storage
        .get_certificate(&app.public_key, CertificateType::Identity)
        .unwrap();
    assert_eq!(
        Some(identity.serial_number),
        device.identity.lock().unwrap().as_ref().map(|c| c.serial_number.clone())
    );
}

#[test]
fn refused_policy_keeps_certificates() {
    init_tracing();
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let sync = Synchronizer::new(
        SqlStorage::open_in_memory().unwrap(),
        authority.clone(),
        ManagerConfig::default(),
    );
    let device = Device {
        refuse_policy: true,
        ..Device::default()
    };
    let admin = IdentityInfo::new(Uuid::new_v4(), authority.public_key());
    let app = sync.claim_application(&new_app(), &admin, &device).unwrap();
    let group = GroupInfo::new(Uuid::new_v4(), authority.public_key());

    let plan = SyncPlan::new().with_group(group.clone());
    let errors = sync.sync_application(&app, &plan, &device);

    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].error_type(), SyncErrorType::Policy);
    let refused = errors[0].policy_artifact().unwrap();
    assert_eq!(refused.acls.len(), 2);
    assert_eq!(refused.acls[0].peers[0].group_id, Some(group.guid));

    let stored = sync
        .storage()
        .get_membership_certificate(&app.public_key, group.guid)
        .unwrap();
    assert_eq!(get_group_id(&stored.encoded).unwrap(), group.guid);
    assert!(sync.storage().get_policy(&app.public_key).is_err());
}

#[test]
fn leave_one_group_and_keep_the_other() {
    init_tracing();
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let sync = Synchronizer::new(
        SqlStorage::open_in_memory().unwrap(),
        authority.clone(),
        ManagerConfig::default(),
    );
    let device = Device::default();
    let admin = IdentityInfo::new(Uuid::new_v4(), authority.public_key());
    let app = sync.claim_application(&new_app(), &admin, &device).unwrap();
    let staff = GroupInfo::new(Uuid::new_v4(), authority.public_key()).with_name("staff");
    let guests = GroupInfo::new(Uuid::new_v4(), authority.public_key()).with_name("guests");
    let plan = SyncPlan::new().with_group(staff.clone()).with_group(guests.clone());
    assert!(sync.sync_application(&app, &plan, &device).is_empty());

    sync.remove_membership(&app, &guests, &device).unwrap();

    let on_device = device.memberships.lock().unwrap().clone();
    assert_eq!(on_device.len(), 1);
    assert_eq!(get_group_id(&on_device[0].encoded).unwrap(), staff.guid);
    let stored = sync.storage().get_membership_certificates(&app.public_key).unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].serial_number, on_device[0].serial_number);

    // a second removal finds nothing to remove
    assert!(sync.remove_membership(&app, &guests, &device).is_err());
}

#[test]
fn reset_then_claim_again() {
    init_tracing();
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let sync = Synchronizer::new(
        SqlStorage::open_in_memory().unwrap(),
        authority.clone(),
        ManagerConfig::default(),
    );
    let device = Device::default();
    let admin = IdentityInfo::new(Uuid::new_v4(), authority.public_key());

    let claimed = sync.claim_application(&new_app(), &admin, &device).unwrap();
    let reset = sync.reset_application(&claimed, &device).unwrap();
    assert!(sync.storage().get_claimed_applications().unwrap().is_empty());

    let again = sync.claim_application(&reset, &admin, &device).unwrap();
    assert_eq!(again.claim_state, ClaimState::Claimed);
    assert_eq!(sync.storage().get_claimed_applications().unwrap().len(), 1);
}
