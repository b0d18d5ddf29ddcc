// error.rs — Error types for certificate generation and parsing.

use sm_model::{ErrorKind, ModelError};
use thiserror::Error;

/// Errors that can occur while encoding, signing, or parsing certificates.
#[derive(Debug, Error)]
pub enum CertError {
    /// The values handed to the DER encoder do not fit the pattern.
    #[error("DER encoding failed: {0}")]
    Encode(String),

    /// DER input did not match the expected structure (wrong tag,
    /// truncated input, trailing data, unknown OID).
    #[error("DER decoding failed: {0}")]
    Decode(String),

    /// Textual PEM framing was missing or the body was not valid base64.
    #[error("invalid PEM input: {0}")]
    Pem(String),

    /// A validity period of zero, or one that overflows the time range.
    #[error("invalid validity period: {0}")]
    InvalidValidity(String),

    /// A key identifier was requested for an all-zero public key.
    #[error("cannot derive a key identifier from an empty public key")]
    EmptyKey,

    /// The certificate has not been signed, so it has no encoded form.
    #[error("certificate has no encoded form")]
    NotEncoded,

    /// The signer failed to produce a signature.
    #[error("signing failed: {0}")]
    Signing(String),

    /// A signature did not verify against the given public key.
    #[error("certificate signature does not verify against issuer key {issuer}")]
    BadSignature { issuer: String },

    /// A key embedded in or supplied with a certificate was malformed.
    #[error(transparent)]
    Key(#[from] ModelError),
}

impl CertError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CertError::Encode(_)
            | CertError::InvalidValidity(_)
            | CertError::EmptyKey
            | CertError::NotEncoded => ErrorKind::BadArgument,
            CertError::Decode(_) | CertError::Pem(_) => ErrorKind::DecodeFailure,
            CertError::Signing(_) | CertError::BadSignature { .. } => ErrorKind::SigningFailure,
            CertError::Key(e) => e.kind(),
        }
    }
}
