// digest.rs — SHA-256 helpers: data digests, key identifiers, hex.

use sha2::{Digest, Sha256};
use sm_model::PublicKey;

use crate::error::CertError;

/// Length of a key identifier derived from a public key.
pub const KEY_IDENTIFIER_SIZE: usize = 8;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Identifier of a public key: the first eight bytes of SHA-256 over
/// `x || y`. Used for subject common names and authority key identifiers.
pub fn key_identifier(key: &PublicKey) -> Result<Vec<u8>, CertError> {
    if key.is_empty() {
        return Err(CertError::EmptyKey);
    }
    Ok(sha256(&key.to_bytes())[..KEY_IDENTIFIER_SIZE].to_vec())
}

/// Lowercase hex, for log fields.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            to_hex(&sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn key_identifier_is_stable_and_short() {
        let key = PublicKey::new([1; 32], [2; 32]);
        let id = key_identifier(&key).unwrap();
        assert_eq!(id.len(), KEY_IDENTIFIER_SIZE);
        assert_eq!(id, key_identifier(&key).unwrap());
        assert_ne!(id, key_identifier(&PublicKey::new([2; 32], [1; 32])).unwrap());
    }

    #[test]
    fn empty_key_has_no_identifier() {
        let err = key_identifier(&PublicKey::default()).unwrap_err();
        assert_eq!(err.kind(), sm_model::ErrorKind::BadArgument);
    }
}
