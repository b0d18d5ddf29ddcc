// error.rs — Error types for the policy subsystem.

use sm_model::ErrorKind;
use thiserror::Error;

/// Errors that can occur during policy operations.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// An Acl carries a zero action mask in a shape that is not a
    /// well-formed deny rule. `acl` is the Acl's index in the policy.
    #[error("invalid deny rule in acl {acl}: {reason}")]
    InvalidDenyRule { acl: usize, reason: String },

    /// The marshaller was handed an empty byte array.
    #[error("cannot import a policy from an empty byte array")]
    EmptyInput,

    /// Export or import through the policy marshaller failed.
    #[error("policy serialization failed: {0}")]
    Serialization(String),
}

impl PolicyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PolicyError::InvalidDenyRule { .. } | PolicyError::EmptyInput => {
                ErrorKind::BadArgument
            }
            PolicyError::Serialization(_) => ErrorKind::SerializationFailure,
        }
    }
}
