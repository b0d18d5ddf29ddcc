// signer.rs — The signing capability handed to the certificate generator.
//
// The manager's private key never passes through this crate's generator:
// it only sees a `Signer`, which owns the key material. `EcdsaSigner` is the
// in-process P-256 implementation; hardware-backed signers implement the
// same trait.

use std::fmt;

use ring::rand::SystemRandom;
use ring::signature::{EcdsaKeyPair, KeyPair, ECDSA_P256_SHA256_ASN1_SIGNING};
use sm_model::PublicKey;

use crate::certificate::Certificate;
use crate::digest::to_hex;
use crate::error::CertError;
use crate::x509::{encode_certificate, encode_tbs};

/// Produces ECDSA P-256 signatures with the issuing authority's key.
pub trait Signer: Send + Sync {
    /// The authority key matching the signatures this signer produces.
    fn public_key(&self) -> PublicKey;

    /// Sign `tbs`, returning a DER-encoded ECDSA signature.
    fn sign(&self, tbs: &[u8]) -> Result<Vec<u8>, CertError>;

    /// Stamp the issuer key onto `cert`, sign its TBS part, and fill in the
    /// signature and DER encoding.
    fn sign_certificate(&self, mut cert: Certificate) -> Result<Certificate, CertError> {
        cert.issuer_public_key = Some(self.public_key());
        let tbs = encode_tbs(&cert)?;
        let signature = self.sign(&tbs)?;
        cert.encoded = encode_certificate(&tbs, &signature)?;
        cert.signature = signature;

        tracing::debug!(
            serial = %to_hex(&cert.serial_number),
            cert_type = %cert.cert_type(),
            "signed certificate"
        );
        Ok(cert)
    }
}

/// In-process ECDSA P-256 signer backed by `ring`.
pub struct EcdsaSigner {
    key_pair: EcdsaKeyPair,
    public_key: PublicKey,
    rng: SystemRandom,
}

impl EcdsaSigner {
    /// Generate a new PKCS#8 key document. Persist it and load it back with
    /// [`EcdsaSigner::from_pkcs8`].
    pub fn generate_pkcs8() -> Result<Vec<u8>, CertError> {
        let rng = SystemRandom::new();
        let document = EcdsaKeyPair::generate_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, &rng)
            .map_err(|_| CertError::Signing("key generation failed".into()))?;
        Ok(document.as_ref().to_vec())
    }

    /// A signer with a fresh, unpersisted key.
    pub fn generate() -> Result<Self, CertError> {
        Self::from_pkcs8(&Self::generate_pkcs8()?)
    }

    pub fn from_pkcs8(pkcs8: &[u8]) -> Result<Self, CertError> {
        let rng = SystemRandom::new();
        let key_pair = EcdsaKeyPair::from_pkcs8(&ECDSA_P256_SHA256_ASN1_SIGNING, pkcs8, &rng)
            .map_err(|e| CertError::Signing(format!("rejected PKCS#8 key: {e}")))?;
        let public_key = PublicKey::from_uncompressed_point(key_pair.public_key().as_ref())?;
        Ok(Self {
            key_pair,
            public_key,
            rng,
        })
    }
}

impl Signer for EcdsaSigner {
    fn public_key(&self) -> PublicKey {
        self.public_key
    }

    fn sign(&self, tbs: &[u8]) -> Result<Vec<u8>, CertError> {
        let signature = self
            .key_pair
            .sign(&self.rng, tbs)
            .map_err(|_| CertError::Signing("ECDSA signing failed".into()))?;
        Ok(signature.as_ref().to_vec())
    }
}

impl fmt::Debug for EcdsaSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcdsaSigner")
            .field("public_key", &self.public_key.to_string())
            .finish_non_exhaustive()
    }
}
