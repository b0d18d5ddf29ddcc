// fleet_isolation.rs — Failures on some applications of a fleet must not
// reach the others.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use sm_cert::{Certificate, CertificateType, EcdsaSigner, Signer};
use sm_model::{ApplicationInfo, ClaimState, ErrorKind, GroupInfo, IdentityInfo, PublicKey};
use sm_storage::{SqlStorage, Storage, StorageError};
use sm_sync::{
    ChannelError, ManagerConfig, SecurityChannel, SyncErrorType, SyncPlan, Synchronizer,
};
use uuid::Uuid;

/// SQLite storage that fails certificate writes for chosen applications.
struct FaultyStorage {
    inner: SqlStorage,
    fail_writes_for: Mutex<HashSet<PublicKey>>,
}

impl FaultyStorage {
    fn new() -> Self {
        Self {
            inner: SqlStorage::open_in_memory().unwrap(),
            fail_writes_for: Mutex::new(HashSet::new()),
        }
    }

    fn break_writes_for(&self, key: PublicKey) {
        self.fail_writes_for.lock().unwrap().insert(key);
    }
}

impl Storage for FaultyStorage {
    fn track_claimed_application(&self, app: &ApplicationInfo) -> Result<(), StorageError> {
        self.inner.track_claimed_application(app)
    }
    fn untrack_claimed_application(&self, app: &ApplicationInfo) -> Result<(), StorageError> {
        self.inner.untrack_claimed_application(app)
    }
    fn get_claimed_applications(&self) -> Result<Vec<ApplicationInfo>, StorageError> {
        self.inner.get_claimed_applications()
    }
    fn get_claimed_application(&self, key: &PublicKey) -> Result<ApplicationInfo, StorageError> {
        self.inner.get_claimed_application(key)
    }
    fn is_claimed_application(&self, key: &PublicKey) -> Result<bool, StorageError> {
        self.inner.is_claimed_application(key)
    }
    fn store_certificate(&self, key: &PublicKey, cert: &Certificate) -> Result<(), StorageError> {
        if self.fail_writes_for.lock().unwrap().contains(key) {
            return Err(StorageError::LockPoisoned);
        }
        self.inner.store_certificate(key, cert)
    }
    fn remove_certificate(
        &self,
        key: &PublicKey,
        cert_type: CertificateType,
    ) -> Result<(), StorageError> {
        self.inner.remove_certificate(key, cert_type)
    }
    fn get_certificate(
        &self,
        key: &PublicKey,
        cert_type: CertificateType,
    ) -> Result<Certificate, StorageError> {
        self.inner.get_certificate(key, cert_type)
    }
    fn get_membership_certificates(
        &self,
        key: &PublicKey,
    ) -> Result<Vec<Certificate>, StorageError> {
        self.inner.get_membership_certificates(key)
    }
    fn get_membership_certificate(
        &self,
        key: &PublicKey,
        guild_id: Uuid,
    ) -> Result<Certificate, StorageError> {
        self.inner.get_membership_certificate(key, guild_id)
    }
    fn remove_membership_certificate(
        &self,
        key: &PublicKey,
        guild_id: Uuid,
    ) -> Result<(), StorageError> {
        self.inner.remove_membership_certificate(key, guild_id)
    }
    fn store_policy(&self, key: &PublicKey, policy: &[u8]) -> Result<(), StorageError> {
        self.inner.store_policy(key, policy)
    }
    fn get_policy(&self, key: &PublicKey) -> Result<Vec<u8>, StorageError> {
        self.inner.get_policy(key)
    }
    fn reset(&self) -> Result<(), StorageError> {
        self.inner.reset()
    }
    fn store_group(&self, group: &GroupInfo) -> Result<(), StorageError> {
        self.inner.store_group(group)
    }
    fn remove_group(&self, authority: &PublicKey, guid: Uuid) -> Result<(), StorageError> {
        self.inner.remove_group(authority, guid)
    }
    fn get_group(&self, authority: &PublicKey, guid: Uuid) -> Result<GroupInfo, StorageError> {
        self.inner.get_group(authority, guid)
    }
    fn get_groups(&self) -> Result<Vec<GroupInfo>, StorageError> {
        self.inner.get_groups()
    }
    fn store_identity(&self, identity: &IdentityInfo) -> Result<(), StorageError> {
        self.inner.store_identity(identity)
    }
    fn remove_identity(&self, authority: &PublicKey, guid: Uuid) -> Result<(), StorageError> {
        self.inner.remove_identity(authority, guid)
    }
    fn get_identity(
        &self,
        authority: &PublicKey,
        guid: Uuid,
    ) -> Result<IdentityInfo, StorageError> {
        self.inner.get_identity(authority, guid)
    }
    fn get_identities(&self) -> Result<Vec<IdentityInfo>, StorageError> {
        self.inner.get_identities()
    }
}

/// A bus on which some applications refuse membership certificates and
/// some crash the handler outright. Counts handlers running at once.
#[derive(Default)]
struct Bus {
    refuse_membership_for: HashSet<PublicKey>,
    panic_for: HashSet<PublicKey>,
    delay: Duration,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl SecurityChannel for Bus {
    fn claim(&self, _: &ApplicationInfo, _: &PublicKey) -> Result<(), ChannelError> {
        Ok(())
    }
    fn install_identity(
        &self,
        _: &ApplicationInfo,
        _: &Certificate,
    ) -> Result<(), ChannelError> {
        Ok(())
    }
    fn install_membership(
        &self,
        app: &ApplicationInfo,
        _: &Certificate,
    ) -> Result<(), ChannelError> {
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_for.contains(&app.public_key) {
            panic!("handler crashed");
        }
        if self.refuse_membership_for.contains(&app.public_key) {
            return Err(ChannelError::new("membership refused"));
        }
        Ok(())
    }
    fn remove_membership(
        &self,
        _: &ApplicationInfo,
        _: &[u8],
        _: &PublicKey,
    ) -> Result<(), ChannelError> {
        Ok(())
    }
    fn update_policy(&self, _: &ApplicationInfo, _: &[u8]) -> Result<(), ChannelError> {
        Ok(())
    }
    fn reset(&self, _: &ApplicationInfo) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Claim `size` applications and plan an identity and one membership for
/// each.
fn claimed_fleet(
    sync: &Synchronizer<FaultyStorage>,
    authority: &EcdsaSigner,
    size: usize,
) -> Vec<(ApplicationInfo, SyncPlan)> {
    let admin = IdentityInfo::new(Uuid::new_v4(), authority.public_key()).with_name("admin");
    let group = GroupInfo::new(Uuid::new_v4(), authority.public_key()).with_name("sensors");

    (0..size)
        .map(|i| {
            let app = ApplicationInfo::new(EcdsaSigner::generate().unwrap().public_key())
                .with_app_name(format!("sensor-{i}"))
                .with_peer_id(Uuid::new_v4())
                .with_claim_state(ClaimState::Claimable);
            let claimed = sync.claim_application(&app, &admin, &Bus::default()).unwrap();
            let plan = SyncPlan::new()
                .with_identity(admin.clone())
                .with_group(group.clone());
            (claimed, plan)
        })
        .collect()
}

#[test]
fn failing_applications_do_not_affect_the_rest() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let sync = Synchronizer::new(
        FaultyStorage::new(),
        authority.clone(),
        ManagerConfig::default(),
    );
    let fleet = claimed_fleet(&sync, &authority, 6);

    let broken_storage = fleet[1].0.public_key;
    let refusing_device = fleet[4].0.public_key;
    sync.storage().break_writes_for(broken_storage);
    let bus = Bus {
        refuse_membership_for: HashSet::from([refusing_device]),
        ..Bus::default()
    };

    let report = sync.sync_fleet(&fleet, &bus);

    assert_eq!(report.synchronized.len(), 4);
    let mut expected_failures = vec![broken_storage, refusing_device];
    expected_failures.sort();
    assert_eq!(report.failed_applications(), expected_failures);

    // storage failed for both certificates of one application
    let storage_errors: Vec<_> = report
        .errors
        .iter()
        .filter(|e| e.application.public_key == broken_storage)
        .collect();
    assert_eq!(storage_errors.len(), 2);
    assert!(storage_errors.iter().all(|e| {
        e.error_type() == SyncErrorType::Storage && e.status == ErrorKind::StorageFailure
    }));

    // the refused membership is carried back, and nothing was stored for it
    let refused: Vec<_> = report
        .errors
        .iter()
        .filter(|e| e.application.public_key == refusing_device)
        .collect();
    assert_eq!(refused.len(), 1);
    assert_eq!(refused[0].status, ErrorKind::RemoteFailure);
    assert!(refused[0].membership_certificate().is_some());
    assert!(sync
        .storage()
        .get_membership_certificates(&refusing_device)
        .unwrap()
        .is_empty());

    for (app, _) in &fleet {
        if app.public_key == broken_storage || app.public_key == refusing_device {
            continue;
        }
        let stored = sync
            .storage()
            .get_membership_certificates(&app.public_key)
            .unwrap();
        assert_eq!(stored.len(), 1);
    }
}

#[test]
fn large_fleet_runs_on_bounded_workers() {
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let config = ManagerConfig {
        sync_workers: 3,
        ..ManagerConfig::default()
    };
    let sync = Synchronizer::new(FaultyStorage::new(), authority.clone(), config);
    let fleet = claimed_fleet(&sync, &authority, 20);
    let bus = Bus {
        delay: Duration::from_millis(5),
        ..Bus::default()
    };

    let report = sync.sync_fleet(&fleet, &bus);

    assert!(report.is_clean(), "unexpected errors: {:?}", report.errors);
    let in_fleet_order: Vec<PublicKey> = fleet.iter().map(|(app, _)| app.public_key).collect();
    assert_eq!(report.synchronized, in_fleet_order);
    let peak = bus.peak.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "{peak} handlers ran at once");
}

#[test]
fn zero_workers_still_synchronizes() {
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let config = ManagerConfig {
        sync_workers: 0,
        ..ManagerConfig::default()
    };
    let sync = Synchronizer::new(FaultyStorage::new(), authority.clone(), config);
    let fleet = claimed_fleet(&sync, &authority, 4);
    let bus = Bus::default();

    let report = sync.sync_fleet(&fleet, &bus);

    assert_eq!(report.synchronized.len(), 4);
    assert_eq!(bus.peak.load(Ordering::SeqCst), 1);
}

#[test]
fn crashed_handler_is_reported_and_the_worker_moves_on() {
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let config = ManagerConfig {
        sync_workers: 1,
        ..ManagerConfig::default()
    };
    let sync = Synchronizer::new(FaultyStorage::new(), authority.clone(), config);
    let fleet = claimed_fleet(&sync, &authority, 5);
    let crashing = fleet[2].0.public_key;
    let bus = Bus {
        panic_for: HashSet::from([crashing]),
        ..Bus::default()
    };

    let report = sync.sync_fleet(&fleet, &bus);

    assert_eq!(report.synchronized.len(), 4);
    assert_eq!(report.failed_applications(), vec![crashing]);
    assert_eq!(report.errors[0].status, ErrorKind::RemoteFailure);
}

#[test]
fn empty_fleet_is_a_clean_report() {
    let authority = Arc::new(EcdsaSigner::generate().unwrap());
    let sync = Synchronizer::new(FaultyStorage::new(), authority, ManagerConfig::default());

    let report = sync.sync_fleet(&[], &Bus::default());
    assert!(report.is_clean());
    assert!(report.synchronized.is_empty());
}
