// error.rs — Error taxonomy shared by every component, plus model errors.
//
// Each crate owns its own error enum, but all of them map onto `ErrorKind`
// so the orchestrator can classify a failure without knowing which crate
// produced it.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Category of a failure, independent of the crate that raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty byte arrays, zero validity periods, malformed key lengths.
    BadArgument,
    /// Policy export/import through the marshaller failed.
    SerializationFailure,
    /// The signer rejected or failed to produce a signature.
    SigningFailure,
    /// ASN.1/DER structure did not match what the parser expected.
    DecodeFailure,
    /// The persistence engine failed (open, exec, commit).
    StorageFailure,
    /// A certificate, group, identity, or application is absent.
    NotFound,
    /// The application is not in a claimable state.
    NotClaimable,
    /// The application is already claimed.
    AlreadyClaimed,
    /// The remote application or the bus refused the artifact.
    RemoteFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::BadArgument => "bad_argument",
            ErrorKind::SerializationFailure => "serialization_failure",
            ErrorKind::SigningFailure => "signing_failure",
            ErrorKind::DecodeFailure => "decode_failure",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::NotFound => "not_found",
            ErrorKind::NotClaimable => "not_claimable",
            ErrorKind::AlreadyClaimed => "already_claimed",
            ErrorKind::RemoteFailure => "remote_failure",
        };
        f.write_str(name)
    }
}

/// Errors raised by the model types themselves.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A public key was built from a byte slice of the wrong size.
    #[error("invalid public key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// An uncompressed EC point did not start with the 0x04 marker.
    #[error("unsupported EC point encoding (leading byte 0x{0:02x})")]
    UnsupportedPointFormat(u8),

    /// The claim guard refused: the application cannot be claimed.
    #[error("application {key} is not claimable (claim state: {state})")]
    NotClaimable { key: String, state: String },

    /// The claim guard refused: the application already has an owner.
    #[error("application {key} is already claimed")]
    AlreadyClaimed { key: String },

    /// A claim-state change that the state machine does not allow.
    #[error("invalid claim state transition from {from} to {to} for application {key}")]
    InvalidTransition {
        key: String,
        from: String,
        to: String,
    },
}

impl ModelError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ModelError::InvalidKeyLength { .. }
            | ModelError::UnsupportedPointFormat(_)
            | ModelError::InvalidTransition { .. } => ErrorKind::BadArgument,
            ModelError::NotClaimable { .. } => ErrorKind::NotClaimable,
            ModelError::AlreadyClaimed { .. } => ErrorKind::AlreadyClaimed,
        }
    }
}
