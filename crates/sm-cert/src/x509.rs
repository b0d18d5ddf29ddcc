// x509.rs — X.509 v3 layout of manager-issued certificates.
//
//   Certificate ::= SEQUENCE { tbs, signatureAlgorithm, signature BIT STRING }
//   tbs ::= SEQUENCE {
//       [0] version (v3), serialNumber, signature (ecdsa-with-SHA256),
//       issuer (CN), validity, subject (OU for memberships, CN),
//       subjectPublicKeyInfo (id-ecPublicKey, prime256v1),
//       [3] extensions }
//
// Extensions carry everything that is not part of the base layout: the
// certificate type (as an extended key usage), delegation, the authority
// key identifier, the application id, identity alias/name, and the data
// digest.

use chrono::Datelike;
use der::{Tag, TagNumber};

use crate::asn1::{self, Asn1Value};
use crate::certificate::{to_datetime, Certificate, CertificateKind, CertificateType};
use crate::digest::key_identifier;
use crate::error::CertError;

pub const OID_ECDSA_SHA256: &str = "1.2.840.10045.4.3.2";
pub const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
pub const OID_PRIME256V1: &str = "1.2.840.10045.3.1.7";
pub const OID_SHA256: &str = "2.16.840.1.101.3.4.2.1";

pub const OID_COMMON_NAME: &str = "2.5.4.3";
pub const OID_ORGANIZATIONAL_UNIT: &str = "2.5.4.11";

pub const OID_BASIC_CONSTRAINTS: &str = "2.5.29.19";
pub const OID_AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
pub const OID_EXTENDED_KEY_USAGE: &str = "2.5.29.37";

pub const OID_EKU_IDENTITY: &str = "1.3.6.1.4.1.44924.1.1";
pub const OID_DATA_DIGEST: &str = "1.3.6.1.4.1.44924.1.2";
pub const OID_IDENTITY_ALIAS: &str = "1.3.6.1.4.1.44924.1.3";
pub const OID_EKU_MEMBERSHIP: &str = "1.3.6.1.4.1.44924.1.5";
pub const OID_APPLICATION_ID: &str = "1.3.6.1.4.1.44924.1.6";
pub const OID_EKU_USER_EQUIVALENCE: &str = "1.3.6.1.4.1.44924.1.7";
pub const OID_EKU_POLICY: &str = "1.3.6.1.4.1.44924.1.8";

/// DER of the organizational unit attribute type, searched for when only
/// the group id of a certificate is needed.
pub const ORGANIZATIONAL_UNIT_OID_DER: [u8; 5] = [0x06, 0x03, 0x55, 0x04, 0x0B];

/// `version` field value for X.509 v3.
pub const X509_VERSION_3: u32 = 2;

pub(crate) const TBS_PATTERN: &str = "(c0(i)l(o)RRR((oo)b)c3((R)))";
pub(crate) const CERTIFICATE_PATTERN: &str = "(R(o)b)";
pub(crate) const PUBLIC_KEY_INFO_PATTERN: &str = "((oo)b)";

const BASIC_CONSTRAINTS_END_ENTITY: [u8; 2] = [0x30, 0x00];
const BASIC_CONSTRAINTS_CA: [u8; 5] = [0x30, 0x03, 0x01, 0x01, 0xFF];

/// `[0] IMPLICIT keyIdentifier` inside AuthorityKeyIdentifier.
const TAG_AKI_KEY_ID: Tag = Tag::ContextSpecific {
    constructed: false,
    number: TagNumber::N0,
};

pub fn type_oid(cert_type: CertificateType) -> &'static str {
    match cert_type {
        CertificateType::Identity => OID_EKU_IDENTITY,
        CertificateType::Membership => OID_EKU_MEMBERSHIP,
        CertificateType::UserEquivalence => OID_EKU_USER_EQUIVALENCE,
        CertificateType::Policy => OID_EKU_POLICY,
    }
}

pub fn type_from_oid(oid: &str) -> Option<CertificateType> {
    CertificateType::ALL
        .into_iter()
        .find(|t| type_oid(*t) == oid)
}

/// DER of the to-be-signed part of `cert`.
pub(crate) fn encode_tbs(cert: &Certificate) -> Result<Vec<u8>, CertError> {
    let issuer = encode_name(&[(OID_COMMON_NAME, cert.issuer_name.as_bytes())])?;

    let mut subject_attrs: Vec<(&str, &[u8])> = Vec::with_capacity(2);
    if let CertificateKind::Membership { guild_id, .. } = &cert.kind {
        subject_attrs.push((OID_ORGANIZATIONAL_UNIT, guild_id.as_bytes().as_slice()));
    }
    subject_attrs.push((OID_COMMON_NAME, cert.subject_cn.as_slice()));
    let subject = encode_name(&subject_attrs)?;

    let validity = asn1::encode(
        "(RR)",
        &[
            Asn1Value::Raw(encode_time(cert.validity.valid_from)?),
            Asn1Value::Raw(encode_time(cert.validity.valid_to)?),
        ],
    )?;

    asn1::encode(
        TBS_PATTERN,
        &[
            Asn1Value::Int(X509_VERSION_3),
            Asn1Value::Integer(cert.serial_number.clone()),
            Asn1Value::Oid(OID_ECDSA_SHA256.into()),
            Asn1Value::Raw(issuer),
            Asn1Value::Raw(validity),
            Asn1Value::Raw(subject),
            Asn1Value::Oid(OID_EC_PUBLIC_KEY.into()),
            Asn1Value::Oid(OID_PRIME256V1.into()),
            Asn1Value::bits(cert.subject_public_key.to_uncompressed_point()),
            Asn1Value::Raw(encode_extensions(cert)?),
        ],
    )
}

/// Assemble the signed certificate from its TBS part and signature.
pub(crate) fn encode_certificate(tbs: &[u8], signature: &[u8]) -> Result<Vec<u8>, CertError> {
    asn1::encode(
        CERTIFICATE_PATTERN,
        &[
            Asn1Value::Raw(tbs.to_vec()),
            Asn1Value::Oid(OID_ECDSA_SHA256.into()),
            Asn1Value::bits(signature.to_vec()),
        ],
    )
}

/// A Name with one single-valued RDN per attribute, in order.
fn encode_name(attrs: &[(&str, &[u8])]) -> Result<Vec<u8>, CertError> {
    let pattern = format!("({})", "{(ou)}".repeat(attrs.len()));
    let values: Vec<Asn1Value> = attrs
        .iter()
        .flat_map(|(oid, value)| {
            [
                Asn1Value::Oid((*oid).into()),
                Asn1Value::Utf8(value.to_vec()),
            ]
        })
        .collect();
    asn1::encode(&pattern, &values)
}

fn encode_extension(oid: &str, value: Vec<u8>) -> Result<Vec<u8>, CertError> {
    asn1::encode("(ox)", &[Asn1Value::Oid(oid.into()), Asn1Value::Octets(value)])
}

fn encode_extensions(cert: &Certificate) -> Result<Vec<u8>, CertError> {
    let basic_constraints = if cert.kind.is_delegate() {
        BASIC_CONSTRAINTS_CA.to_vec()
    } else {
        BASIC_CONSTRAINTS_END_ENTITY.to_vec()
    };
    let mut out = encode_extension(OID_BASIC_CONSTRAINTS, basic_constraints)?;

    let eku = asn1::encode("(o)", &[Asn1Value::Oid(type_oid(cert.cert_type()).into())])?;
    out.extend(encode_extension(OID_EXTENDED_KEY_USAGE, eku)?);

    if let Some(issuer) = &cert.issuer_public_key {
        let key_id = asn1::tlv(TAG_AKI_KEY_ID, &key_identifier(issuer)?)?;
        let aki = asn1::tlv(Tag::Sequence, &key_id)?;
        out.extend(encode_extension(OID_AUTHORITY_KEY_IDENTIFIER, aki)?);
    }

    let app_id = asn1::encode(
        "x",
        &[Asn1Value::Octets(cert.application_id.as_bytes().to_vec())],
    )?;
    out.extend(encode_extension(OID_APPLICATION_ID, app_id)?);

    if let CertificateKind::Identity { alias, name } = &cert.kind {
        let value = asn1::encode(
            "(uu)",
            &[
                Asn1Value::Utf8(alias.as_bytes().to_vec()),
                Asn1Value::Utf8(name.as_bytes().to_vec()),
            ],
        )?;
        out.extend(encode_extension(OID_IDENTITY_ALIAS, value)?);
    }

    if !cert.data_digest.is_empty() {
        let value = asn1::encode(
            "(ox)",
            &[
                Asn1Value::Oid(OID_SHA256.into()),
                Asn1Value::Octets(cert.data_digest.clone()),
            ],
        )?;
        out.extend(encode_extension(OID_DATA_DIGEST, value)?);
    }

    Ok(out)
}

/// UTCTime for 1950 through 2049, GeneralizedTime otherwise.
pub(crate) fn encode_time(epoch: i64) -> Result<Vec<u8>, CertError> {
    let dt = to_datetime(epoch)
        .ok_or_else(|| CertError::Encode(format!("time {epoch} cannot be encoded")))?;
    if (1950..=2049).contains(&dt.year()) {
        let text = dt.format("%y%m%d%H%M%SZ").to_string();
        asn1::encode("t", &[Asn1Value::UtcTime(text.into_bytes())])
    } else {
        let text = dt.format("%Y%m%d%H%M%SZ").to_string();
        asn1::encode("g", &[Asn1Value::GeneralizedTime(text.into_bytes())])
    }
}
