// synchronizer.rs — Claims applications and pushes their certificates and
// policy.
//
// Every step that fails becomes one SyncError and the remaining steps still
// run. Certificates and policies are stored only after the application
// accepted them, so storage always reflects what is installed.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use sm_cert::{Certificate, CertificateGenerator, Signer};
use sm_model::{ApplicationInfo, ClaimState, ErrorKind, GroupInfo, IdentityInfo, PublicKey};
use sm_policy::{
    default_policy, normalize_policy, validate_deny_rules, JsonPolicyMarshaller, Policy,
    PolicyMarshaller,
};
use sm_storage::{SqlStorage, Storage, StorageError};

use crate::channel::SecurityChannel;
use crate::config::ManagerConfig;
use crate::error::ManagerError;
use crate::sync_error::{SyncError, SyncFailure};

/// What one application should end up with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    /// `None` leaves the installed identity certificate alone.
    pub identity: Option<IdentityInfo>,
    /// One membership certificate is issued per group, and the policy
    /// grants each group full access.
    pub groups: Vec<GroupInfo>,
    /// Keys denied everything by the policy.
    pub denied_keys: Vec<PublicKey>,
}

impl SyncPlan {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_identity(mut self, identity: IdentityInfo) -> Self {
        self.identity = Some(identity);
        self
    }

    pub fn with_group(mut self, group: GroupInfo) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_denied_key(mut self, key: PublicKey) -> Self {
        self.denied_keys.push(key);
        self
    }
}

/// Outcome of a fleet-wide synchronization.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Applications that synchronized without a single error.
    pub synchronized: Vec<PublicKey>,
    pub errors: Vec<SyncError>,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    /// Keys of applications with at least one error, in key order.
    pub fn failed_applications(&self) -> Vec<PublicKey> {
        let mut keys: Vec<PublicKey> = self
            .errors
            .iter()
            .map(|e| e.application.public_key)
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }
}

fn failed(err: SyncError) -> SyncError {
    tracing::warn!(
        application = %err.application.public_key,
        error_type = %err.error_type(),
        status = %err.status,
        reason = %err.reason,
        "synchronization step failed"
    );
    err
}

fn unknown_failure(app: &ApplicationInfo, status: ErrorKind, reason: String) -> SyncError {
    failed(SyncError::new(app, status, SyncFailure::Unknown, reason))
}

fn storage_failure(app: &ApplicationInfo, e: StorageError) -> SyncError {
    failed(SyncError::new(app, e.kind(), SyncFailure::Storage, e.to_string()))
}

/// Per-application outcomes of a fleet run, indexed like the fleet. `None`
/// marks an application whose synchronization panicked.
type FleetOutcomes = Vec<(usize, Option<Vec<SyncError>>)>;

pub struct Synchronizer<S: Storage> {
    storage: S,
    generator: CertificateGenerator,
    marshaller: Box<dyn PolicyMarshaller>,
    config: ManagerConfig,
}

impl Synchronizer<SqlStorage> {
    /// Open the SQLite storage named by `config` and issue with `signer`.
    pub fn open(config: ManagerConfig, signer: Arc<dyn Signer>) -> Result<Self, ManagerError> {
        let storage = SqlStorage::open(&config.storage)?;
        Ok(Self::new(storage, signer, config))
    }
}

impl<S: Storage> Synchronizer<S> {
    pub fn new(storage: S, signer: Arc<dyn Signer>, config: ManagerConfig) -> Self {
        Self {
            storage,
            generator: CertificateGenerator::new(config.issuer_name.clone(), signer),
            marshaller: Box::new(JsonPolicyMarshaller),
            config,
        }
    }

    pub fn with_marshaller(mut self, marshaller: Box<dyn PolicyMarshaller>) -> Self {
        self.marshaller = marshaller;
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn generator(&self) -> &CertificateGenerator {
        &self.generator
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Claim `app`, install an identity certificate for `identity`, and
    /// start tracking it. Returns the application in its claimed state.
    pub fn claim_application(
        &self,
        app: &ApplicationInfo,
        identity: &IdentityInfo,
        channel: &dyn SecurityChannel,
    ) -> Result<ApplicationInfo, SyncError> {
        app.check_claimable()
            .map_err(|e| unknown_failure(app, e.kind(), e.to_string()))?;

        channel
            .claim(app, &self.generator.issuer_public_key())
            .map_err(|e| unknown_failure(app, e.kind(), e.to_string()))?;

        let cert = self.issue_identity(app, identity)?;
        channel
            .install_identity(app, &cert)
            .map_err(|e| failed(SyncError::identity(app, e.kind(), &cert, e.to_string())))?;

        let mut claimed = app.clone();
        claimed
            .transition_claim_state(ClaimState::Claimed)
            .map_err(|e| unknown_failure(app, e.kind(), e.to_string()))?;
        self.storage
            .track_claimed_application(&claimed)
            .map_err(|e| storage_failure(app, e))?;
        self.store_certificate(&claimed, &cert)?;

        tracing::info!(
            application = %claimed.public_key,
            app_name = %claimed.app_name,
            "application claimed"
        );
        Ok(claimed)
    }

    /// Push everything in `plan` to a claimed application. Returns one
    /// error per failed step; an empty list means fully synchronized.
    pub fn sync_application(
        &self,
        app: &ApplicationInfo,
        plan: &SyncPlan,
        channel: &dyn SecurityChannel,
    ) -> Vec<SyncError> {
        match self.storage.is_claimed_application(&app.public_key) {
            Ok(true) => {}
            Ok(false) => {
                return vec![unknown_failure(
                    app,
                    ErrorKind::NotClaimable,
                    "application is not claimed by this manager".into(),
                )]
            }
            Err(e) => return vec![storage_failure(app, e)],
        }

        let mut errors = Vec::new();
        if let Some(identity) = &plan.identity {
            if let Err(e) = self.sync_identity(app, identity, channel) {
                errors.push(e);
            }
        }
        for group in &plan.groups {
            if let Err(e) = self.sync_membership(app, group, channel) {
                errors.push(e);
            }
        }
        if let Err(e) = self.sync_policy(app, plan, channel) {
            errors.push(e);
        }

        tracing::debug!(
            application = %app.public_key,
            groups = plan.groups.len(),
            errors = errors.len(),
            "application synchronized"
        );
        errors
    }

    /// Take `app` out of `group`: the application drops the membership
    /// certificate first, then the stored copy is removed.
    pub fn remove_membership(
        &self,
        app: &ApplicationInfo,
        group: &GroupInfo,
        channel: &dyn SecurityChannel,
    ) -> Result<(), SyncError> {
        let cert = self
            .storage
            .get_membership_certificate(&app.public_key, group.guid)
            .map_err(|e| storage_failure(app, e))?;
        let issuer = cert
            .issuer_public_key
            .unwrap_or_else(|| self.generator.issuer_public_key());

        channel
            .remove_membership(app, &cert.serial_number, &issuer)
            .map_err(|e| failed(SyncError::membership(app, e.kind(), &cert, e.to_string())))?;
        self.storage
            .remove_membership_certificate(&app.public_key, group.guid)
            .map_err(|e| storage_failure(app, e))?;

        tracing::info!(application = %app.public_key, group = %group.guid, "membership removed");
        Ok(())
    }

    /// The policy last accepted by the application behind `key`.
    pub fn installed_policy(&self, key: &PublicKey) -> Result<Policy, ManagerError> {
        let bytes = self.storage.get_policy(key)?;
        Ok(self.marshaller.import(&bytes)?)
    }

    /// Return `app` to its claimable state and forget it.
    pub fn reset_application(
        &self,
        app: &ApplicationInfo,
        channel: &dyn SecurityChannel,
    ) -> Result<ApplicationInfo, SyncError> {
        let reset_failure = |status: ErrorKind, reason: String| {
            failed(SyncError::new(app, status, SyncFailure::Reset, reason))
        };

        channel
            .reset(app)
            .map_err(|e| reset_failure(e.kind(), e.to_string()))?;
        self.storage
            .untrack_claimed_application(app)
            .map_err(|e| storage_failure(app, e))?;

        let mut reset = app.clone();
        reset
            .transition_claim_state(ClaimState::Claimable)
            .map_err(|e| reset_failure(e.kind(), e.to_string()))?;

        tracing::info!(application = %reset.public_key, "application reset");
        Ok(reset)
    }

    /// Synchronize the fleet on at most `sync_workers` threads. Workers take
    /// the next application from a shared cursor, so a slow application
    /// only holds back its own worker. Results are reported in fleet order.
    pub fn sync_fleet(
        &self,
        fleet: &[(ApplicationInfo, SyncPlan)],
        channel: &dyn SecurityChannel,
    ) -> SyncReport {
        let next = AtomicUsize::new(0);
        let work = || {
            let mut done: FleetOutcomes = Vec::new();
            loop {
                let index = next.fetch_add(1, Ordering::Relaxed);
                let Some((app, plan)) = fleet.get(index) else {
                    break;
                };
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    self.sync_application(app, plan, channel)
                }));
                done.push((index, outcome.ok()));
            }
            done
        };

        let workers = self.config.sync_workers.max(1).min(fleet.len());
        let finished: FleetOutcomes = thread::scope(|s| {
            // the calling thread is worker 0
            let mut handles = Vec::new();
            for n in 1..workers {
                let spawned = thread::Builder::new()
                    .name(format!("fleet-sync-{n}"))
                    .spawn_scoped(s, &work);
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        tracing::warn!(
                            worker = n,
                            error = %e,
                            "could not start sync worker, continuing with fewer"
                        );
                        break;
                    }
                }
            }
            let mut finished = work();
            for handle in handles {
                if let Ok(done) = handle.join() {
                    finished.extend(done);
                }
            }
            finished
        });

        let mut outcomes: Vec<Option<Vec<SyncError>>> = vec![None; fleet.len()];
        for (index, outcome) in finished {
            outcomes[index] = outcome;
        }

        let mut report = SyncReport::default();
        for ((app, _), outcome) in fleet.iter().zip(outcomes) {
            match outcome {
                Some(errors) if errors.is_empty() => report.synchronized.push(app.public_key),
                Some(errors) => report.errors.extend(errors),
                None => report.errors.push(unknown_failure(
                    app,
                    ErrorKind::RemoteFailure,
                    "synchronization panicked".into(),
                )),
            }
        }

        tracing::info!(
            applications = fleet.len(),
            workers,
            synchronized = report.synchronized.len(),
            errors = report.errors.len(),
            "fleet synchronization finished"
        );
        report
    }

    fn issue_identity(
        &self,
        app: &ApplicationInfo,
        identity: &IdentityInfo,
    ) -> Result<Certificate, SyncError> {
        self.generator
            .generate_identity_certificate(app, identity, self.config.identity_validity_secs)
            .map_err(|e| unknown_failure(app, e.kind(), e.to_string()))
    }

    fn store_certificate(
        &self,
        app: &ApplicationInfo,
        cert: &Certificate,
    ) -> Result<(), SyncError> {
        self.storage
            .store_certificate(&app.public_key, cert)
            .map_err(|e| storage_failure(app, e))
    }

    fn sync_identity(
        &self,
        app: &ApplicationInfo,
        identity: &IdentityInfo,
        channel: &dyn SecurityChannel,
    ) -> Result<(), SyncError> {
        let cert = self.issue_identity(app, identity)?;
        channel
            .install_identity(app, &cert)
            .map_err(|e| failed(SyncError::identity(app, e.kind(), &cert, e.to_string())))?;
        self.store_certificate(app, &cert)
    }

    fn sync_membership(
        &self,
        app: &ApplicationInfo,
        group: &GroupInfo,
        channel: &dyn SecurityChannel,
    ) -> Result<(), SyncError> {
        let cert = self
            .generator
            .generate_membership_certificate(app, group, self.config.membership_validity_secs)
            .map_err(|e| unknown_failure(app, e.kind(), e.to_string()))?;
        channel
            .install_membership(app, &cert)
            .map_err(|e| failed(SyncError::membership(app, e.kind(), &cert, e.to_string())))?;
        self.store_certificate(app, &cert)
    }

    fn sync_policy(
        &self,
        app: &ApplicationInfo,
        plan: &SyncPlan,
        channel: &dyn SecurityChannel,
    ) -> Result<(), SyncError> {
        let policy = normalize_policy(default_policy(&plan.groups, &plan.denied_keys));
        let policy_failure = |status: ErrorKind, reason: String| {
            failed(SyncError::policy(app, status, &policy, reason))
        };

        validate_deny_rules(&policy).map_err(|e| policy_failure(e.kind(), e.to_string()))?;
        let bytes = self
            .marshaller
            .export(&policy)
            .map_err(|e| policy_failure(e.kind(), e.to_string()))?;
        channel
            .update_policy(app, &bytes)
            .map_err(|e| policy_failure(e.kind(), e.to_string()))?;
        self.storage
            .store_policy(&app.public_key, &bytes)
            .map_err(|e| storage_failure(app, e))?;

        tracing::debug!(
            application = %app.public_key,
            acls = policy.acls.len(),
            "policy installed"
        );
        Ok(())
    }
}
