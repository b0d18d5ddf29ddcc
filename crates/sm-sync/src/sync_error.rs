// sync_error.rs — Failure records handed back to the orchestrator.
//
// A SyncError names the application, the kind of failure, and (for push
// failures) an owned copy of the artifact that was refused, so the caller
// can report or retry without holding on to anything else.

use std::fmt;

use serde::{Deserialize, Serialize};
use sm_cert::Certificate;
use sm_model::{ApplicationInfo, ErrorKind};
use sm_policy::Policy;
use thiserror::Error;

/// Which step of a synchronization failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorType {
    Unknown,
    Storage,
    Reset,
    Identity,
    Membership,
    Policy,
}

impl fmt::Display for SyncErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncErrorType::Unknown => "unknown",
            SyncErrorType::Storage => "storage",
            SyncErrorType::Reset => "reset",
            SyncErrorType::Identity => "identity",
            SyncErrorType::Membership => "membership",
            SyncErrorType::Policy => "policy",
        };
        f.write_str(name)
    }
}

/// The failed step, carrying the refused artifact where there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "artifact", rename_all = "snake_case")]
pub enum SyncFailure {
    Unknown,
    Storage,
    Reset,
    Identity(Certificate),
    Membership(Certificate),
    Policy(Policy),
}

impl SyncFailure {
    pub fn error_type(&self) -> SyncErrorType {
        match self {
            SyncFailure::Unknown => SyncErrorType::Unknown,
            SyncFailure::Storage => SyncErrorType::Storage,
            SyncFailure::Reset => SyncErrorType::Reset,
            SyncFailure::Identity(_) => SyncErrorType::Identity,
            SyncFailure::Membership(_) => SyncErrorType::Membership,
            SyncFailure::Policy(_) => SyncErrorType::Policy,
        }
    }
}

/// One failed step of claiming, synchronizing, or resetting an application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error(
    "{} sync of {} failed ({status}): {reason}",
    .failure.error_type(),
    .application.public_key
)]
pub struct SyncError {
    pub application: ApplicationInfo,
    pub status: ErrorKind,
    pub failure: SyncFailure,
    pub reason: String,
}

impl SyncError {
    /// Use for status-only failures; the named constructors below copy the
    /// refused artifact in.
    pub fn new(
        application: &ApplicationInfo,
        status: ErrorKind,
        failure: SyncFailure,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            application: application.clone(),
            status,
            failure,
            reason: reason.into(),
        }
    }

    pub fn identity(
        application: &ApplicationInfo,
        status: ErrorKind,
        cert: &Certificate,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(application, status, SyncFailure::Identity(cert.clone()), reason)
    }

    pub fn membership(
        application: &ApplicationInfo,
        status: ErrorKind,
        cert: &Certificate,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(application, status, SyncFailure::Membership(cert.clone()), reason)
    }

    pub fn policy(
        application: &ApplicationInfo,
        status: ErrorKind,
        policy: &Policy,
        reason: impl Into<String>,
    ) -> Self {
        Self::new(application, status, SyncFailure::Policy(policy.clone()), reason)
    }

    pub fn error_type(&self) -> SyncErrorType {
        self.failure.error_type()
    }

    pub fn identity_certificate(&self) -> Option<&Certificate> {
        match &self.failure {
            SyncFailure::Identity(cert) => Some(cert),
            _ => None,
        }
    }

    pub fn membership_certificate(&self) -> Option<&Certificate> {
        match &self.failure {
            SyncFailure::Membership(cert) => Some(cert),
            _ => None,
        }
    }

    pub fn policy_artifact(&self) -> Option<&Policy> {
        match &self.failure {
            SyncFailure::Policy(policy) => Some(policy),
            _ => None,
        }
    }
}
