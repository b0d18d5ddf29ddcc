// certificate.rs — Certificate model.
//
// All four certificate types share one X.509 ECC base. The type-specific
// fields live in `CertificateKind`, so storage and serialization can match
// exhaustively on the variant instead of downcasting.

use std::fmt;

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use sm_model::PublicKey;
use uuid::Uuid;

use crate::error::CertError;
use crate::pem::encode_pem;

/// Seconds certificates are back-dated to absorb clock skew between the
/// manager and the device.
pub const CLOCK_SKEW_SECS: i64 = 3600;

pub const PEM_LABEL: &str = "CERTIFICATE";

/// Discriminant of [`CertificateKind`], used as a storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateType {
    Identity,
    Membership,
    UserEquivalence,
    Policy,
}

impl CertificateType {
    pub const ALL: [CertificateType; 4] = [
        CertificateType::Identity,
        CertificateType::Membership,
        CertificateType::UserEquivalence,
        CertificateType::Policy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CertificateType::Identity => "identity",
            CertificateType::Membership => "membership",
            CertificateType::UserEquivalence => "user_equivalence",
            CertificateType::Policy => "policy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == name)
    }
}

impl fmt::Display for CertificateType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific certificate content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CertificateKind {
    /// Binds the subject key to a user identity.
    Identity { alias: String, name: String },
    /// Admits the subject key to a security group.
    Membership { guild_id: Uuid, is_delegate: bool },
    UserEquivalence,
    Policy,
}

impl CertificateKind {
    pub fn cert_type(&self) -> CertificateType {
        match self {
            CertificateKind::Identity { .. } => CertificateType::Identity,
            CertificateKind::Membership { .. } => CertificateType::Membership,
            CertificateKind::UserEquivalence => CertificateType::UserEquivalence,
            CertificateKind::Policy => CertificateType::Policy,
        }
    }

    /// Whether the subject may issue further certificates.
    pub fn is_delegate(&self) -> bool {
        matches!(self, CertificateKind::Membership { is_delegate: true, .. })
    }
}

/// Validity window in epoch seconds, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validity {
    pub valid_from: i64,
    pub valid_to: i64,
}

impl Validity {
    /// Window for a certificate issued at `now`: starts [`CLOCK_SKEW_SECS`]
    /// before `now` and ends `validity_secs` after it.
    pub fn starting_at(now: i64, validity_secs: u64) -> Result<Self, CertError> {
        if validity_secs == 0 {
            return Err(CertError::InvalidValidity("validity period is zero".into()));
        }
        let out_of_range =
            || CertError::InvalidValidity(format!("{validity_secs}s from {now} is out of range"));

        let valid_to = i64::try_from(validity_secs)
            .ok()
            .and_then(|secs| now.checked_add(secs))
            .ok_or_else(out_of_range)?;
        let valid_from = now.checked_sub(CLOCK_SKEW_SECS).ok_or_else(out_of_range)?;

        // Both ends must be representable as certificate timestamps.
        for t in [valid_from, valid_to] {
            if to_datetime(t).is_none() {
                return Err(out_of_range());
            }
        }
        Ok(Self {
            valid_from,
            valid_to,
        })
    }

    pub fn contains(&self, t: i64) -> bool {
        self.valid_from <= t && t <= self.valid_to
    }
}

/// Epoch seconds to a UTC time, limited to the four-digit years X.509
/// time strings can carry.
pub(crate) fn to_datetime(epoch: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(epoch, 0).filter(|dt| (0..=9999).contains(&dt.year()))
}

/// An X.509 ECC certificate, signed or not.
///
/// `encoded` holds the DER form once the certificate is signed and is
/// empty before that. The certificate owns every byte it refers to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub kind: CertificateKind,
    /// Positive serial, at most 16 bytes, no leading zero byte.
    pub serial_number: Vec<u8>,
    pub application_id: Uuid,
    pub issuer_name: String,
    /// Set by the signer. Not part of the encoding, so parsed
    /// certificates have `None` here.
    pub issuer_public_key: Option<PublicKey>,
    pub subject_public_key: PublicKey,
    /// Subject common name; raw bytes since key identifiers are binary.
    pub subject_cn: Vec<u8>,
    #[serde(default)]
    pub data_digest: Vec<u8>,
    pub validity: Validity,
    #[serde(default)]
    pub signature: Vec<u8>,
    #[serde(default)]
    pub encoded: Vec<u8>,
}

impl Certificate {
    /// An unsigned certificate with a fresh serial number.
    pub fn new(
        kind: CertificateKind,
        subject_public_key: PublicKey,
        subject_cn: Vec<u8>,
        validity: Validity,
    ) -> Self {
        Self {
            kind,
            serial_number: new_serial_number(),
            application_id: Uuid::nil(),
            issuer_name: String::new(),
            issuer_public_key: None,
            subject_public_key,
            subject_cn,
            data_digest: Vec::new(),
            validity,
            signature: Vec::new(),
            encoded: Vec::new(),
        }
    }

    pub fn cert_type(&self) -> CertificateType {
        self.kind.cert_type()
    }

    pub fn is_signed(&self) -> bool {
        !self.encoded.is_empty()
    }

    pub fn to_pem(&self) -> Result<String, CertError> {
        if !self.is_signed() {
            return Err(CertError::NotEncoded);
        }
        Ok(encode_pem(PEM_LABEL, &self.encoded))
    }
}

/// 16 random bytes with the first byte in `0x01..=0x7F`, so the serial is
/// a positive DER INTEGER that round-trips byte for byte.
pub fn new_serial_number() -> Vec<u8> {
    let mut serial = Uuid::new_v4().into_bytes().to_vec();
    serial[0] = (serial[0] & 0x7F).max(0x01);
    serial
}
