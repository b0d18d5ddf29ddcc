// error.rs — Errors for manager setup and for the security channel.

use sm_model::ErrorKind;
use sm_policy::PolicyError;
use sm_storage::StorageError;
use thiserror::Error;

/// The remote application, or the bus carrying the request, refused it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("security channel: {reason}")]
pub struct ChannelError {
    pub reason: String,
}

impl ChannelError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::RemoteFailure
    }
}

/// Errors raised while setting up a synchronizer or reading back what it
/// recorded.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// The manager configuration file could not be read or parsed.
    #[error("invalid manager config {path}: {reason}")]
    Config { path: String, reason: String },

    /// The backing storage could not be opened.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A stored policy could not be rebuilt by the marshaller.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl ManagerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ManagerError::Config { .. } => ErrorKind::BadArgument,
            ManagerError::Storage(e) => e.kind(),
            ManagerError::Policy(e) => e.kind(),
        }
    }
}
