// error.rs — Error types for the storage layer.

use sm_cert::CertError;
use sm_model::ErrorKind;
use thiserror::Error;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The database file could not be opened or created.
    #[error("failed to open storage at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The database engine failed while executing or committing.
    #[error("storage engine error: {0}")]
    Engine(#[from] rusqlite::Error),

    /// Another thread panicked while holding the connection.
    #[error("storage lock poisoned")]
    LockPoisoned,

    /// A stored row could not be turned back into a value.
    #[error("corrupt storage row: {0}")]
    Corrupt(String),

    /// The requested record does not exist.
    #[error("{what} not found")]
    NotFound { what: String },

    /// The caller supplied a value that cannot be stored.
    #[error("invalid argument: {0}")]
    BadArgument(String),

    /// A stored certificate failed to parse.
    #[error(transparent)]
    Certificate(#[from] CertError),

    /// The storage configuration file could not be read or parsed.
    #[error("invalid storage config {path}: {reason}")]
    Config { path: String, reason: String },
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Open { .. }
            | StorageError::Engine(_)
            | StorageError::LockPoisoned
            | StorageError::Corrupt(_) => ErrorKind::StorageFailure,
            StorageError::NotFound { .. } => ErrorKind::NotFound,
            StorageError::BadArgument(_) | StorageError::Config { .. } => ErrorKind::BadArgument,
            StorageError::Certificate(e) => e.kind(),
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        StorageError::NotFound { what: what.into() }
    }
}
