// parser.rs — Extracts fields from encoded certificates.
//
// Every entry point accepts DER or PEM. The X.509 structure is read with
// x509-parser; the manager's own extensions are decoded from their raw
// values with the pattern codec.

use ring::signature::{UnparsedPublicKey, ECDSA_P256_SHA256_ASN1};
use sm_model::PublicKey;
use uuid::Uuid;
use x509_parser::prelude::*;

use crate::asn1::{self, Asn1Value};
use crate::certificate::{Certificate, CertificateKind, CertificateType, Validity};
use crate::error::CertError;
use crate::pem::to_der;
use crate::x509::{
    self, OID_APPLICATION_ID, OID_AUTHORITY_KEY_IDENTIFIER, OID_BASIC_CONSTRAINTS,
    OID_COMMON_NAME, OID_DATA_DIGEST, OID_ECDSA_SHA256, OID_EC_PUBLIC_KEY,
    OID_EXTENDED_KEY_USAGE, OID_IDENTITY_ALIAS, OID_ORGANIZATIONAL_UNIT, OID_PRIME256V1,
    OID_SHA256, ORGANIZATIONAL_UNIT_OID_DER, PUBLIC_KEY_INFO_PATTERN,
};

#[derive(Default)]
struct Extensions {
    cert_type: Option<CertificateType>,
    is_delegate: bool,
    application_id: Option<Uuid>,
    alias_and_name: Option<(String, String)>,
    data_digest: Vec<u8>,
}

/// Parse `der` as a manager-issued certificate: X.509 v3, signed with
/// ECDSA over SHA-256, nothing after the outer SEQUENCE.
fn read_x509(der: &[u8]) -> Result<X509Certificate<'_>, CertError> {
    let (rest, cert) = parse_x509_certificate(der)
        .map_err(|e| CertError::Decode(format!("failed to parse certificate: {e}")))?;
    if !rest.is_empty() {
        return Err(CertError::Decode(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }
    if cert.version() != X509Version::V3 {
        return Err(CertError::Decode(format!(
            "unsupported certificate version {}",
            cert.version().0
        )));
    }
    check_oid(
        "signature algorithm",
        &cert.signature_algorithm.algorithm.to_id_string(),
        OID_ECDSA_SHA256,
    )?;
    Ok(cert)
}

fn check_oid(what: &str, found: &str, expected: &str) -> Result<(), CertError> {
    if found != expected {
        return Err(CertError::Decode(format!("{what}: expected {expected}, found {found}")));
    }
    Ok(())
}

/// Serial magnitude without the DER sign byte.
fn serial_magnitude(raw: &[u8]) -> Vec<u8> {
    match raw {
        [0, rest @ ..] if !rest.is_empty() => rest.to_vec(),
        _ => raw.to_vec(),
    }
}

/// `(attribute type, value)` pairs of a Name, in encoding order. Values
/// are the raw string contents; a group id is not valid UTF-8.
fn decode_name(name: &X509Name<'_>) -> Vec<(String, Vec<u8>)> {
    name.iter_attributes()
        .map(|attr| (attr.attr_type().to_id_string(), attr.attr_value().data.to_vec()))
        .collect()
}

fn find_attr<'a>(attrs: &'a [(String, Vec<u8>)], oid: &str) -> Option<&'a [u8]> {
    attrs
        .iter()
        .find(|(attr_oid, _)| attr_oid == oid)
        .map(|(_, value)| value.as_slice())
}

fn decode_validity(cert: &X509Certificate<'_>) -> Validity {
    let validity = cert.validity();
    Validity {
        valid_from: validity.not_before.timestamp(),
        valid_to: validity.not_after.timestamp(),
    }
}

fn decode_subject_public_key(spki: &SubjectPublicKeyInfo<'_>) -> Result<PublicKey, CertError> {
    match asn1::decode(PUBLIC_KEY_INFO_PATTERN, spki.raw)?.as_slice() {
        [Asn1Value::Oid(algorithm), Asn1Value::Oid(curve), Asn1Value::Bits {
            data,
            unused_bits: 0,
        }] => {
            check_oid("key algorithm", algorithm, OID_EC_PUBLIC_KEY)?;
            check_oid("curve", curve, OID_PRIME256V1)?;
            PublicKey::from_uncompressed_point(data)
                .map_err(|e| CertError::Decode(format!("subject public key: {e}")))
        }
        _ => Err(CertError::Decode("malformed subject public key info".into())),
    }
}

fn utf8(bytes: Vec<u8>, what: &str) -> Result<String, CertError> {
    String::from_utf8(bytes).map_err(|_| CertError::Decode(format!("{what} is not UTF-8")))
}

fn decode_extensions(cert: &X509Certificate<'_>) -> Result<Extensions, CertError> {
    let mut out = Extensions::default();
    for extension in cert.extensions() {
        let oid = extension.oid.to_id_string();
        let value = extension.value;
        match oid.as_str() {
            OID_BASIC_CONSTRAINTS => {
                if let ParsedExtension::BasicConstraints(constraints) =
                    extension.parsed_extension()
                {
                    out.is_delegate = constraints.ca;
                }
            }
            OID_EXTENDED_KEY_USAGE => {
                if let [Asn1Value::Oid(usage)] = asn1::decode("(o)", value)?.as_slice() {
                    out.cert_type = x509::type_from_oid(usage);
                }
            }
            OID_APPLICATION_ID => {
                if let [Asn1Value::Octets(id)] = asn1::decode("x", value)?.as_slice() {
                    let id = Uuid::from_slice(id)
                        .map_err(|_| CertError::Decode("application id is not 16 bytes".into()))?;
                    out.application_id = Some(id);
                }
            }
            OID_IDENTITY_ALIAS => {
                if let Ok([Asn1Value::Utf8(alias), Asn1Value::Utf8(name)]) =
                    <[Asn1Value; 2]>::try_from(asn1::decode("(uu)", value)?)
                {
                    out.alias_and_name = Some((utf8(alias, "alias")?, utf8(name, "name")?));
                }
            }
            OID_DATA_DIGEST => {
                if let [Asn1Value::Oid(algorithm), Asn1Value::Octets(digest)] =
                    asn1::decode("(ox)", value)?.as_slice()
                {
                    check_oid("digest algorithm", algorithm, OID_SHA256)?;
                    out.data_digest = digest.clone();
                }
            }
            OID_AUTHORITY_KEY_IDENTIFIER => {}
            other => tracing::debug!(oid = other, "ignoring unknown certificate extension"),
        }
    }
    Ok(out)
}

/// Serial number of an encoded certificate.
pub fn get_serial_number(encoded: &[u8]) -> Result<Vec<u8>, CertError> {
    let der = to_der(encoded)?;
    let cert = read_x509(&der)?;
    Ok(serial_magnitude(cert.tbs_certificate.raw_serial()))
}

/// Validity window of an encoded certificate.
pub fn get_validity(encoded: &[u8]) -> Result<Validity, CertError> {
    let der = to_der(encoded)?;
    let cert = read_x509(&der)?;
    Ok(decode_validity(&cert))
}

/// Group id carried in the subject's organizational unit. Scans the DER for
/// the OU attribute type and reads the string that follows it.
pub fn get_group_id(encoded: &[u8]) -> Result<Uuid, CertError> {
    let der = to_der(encoded)?;
    let position = der
        .windows(ORGANIZATIONAL_UNIT_OID_DER.len())
        .position(|window| window == ORGANIZATIONAL_UNIT_OID_DER)
        .ok_or_else(|| CertError::Decode("organizational unit not found".into()))?;

    let after_oid = &der[position + ORGANIZATIONAL_UNIT_OID_DER.len()..];
    let (values, _) = asn1::decode_prefix("u", after_oid)?;
    match values.as_slice() {
        [Asn1Value::Utf8(bytes)] => Uuid::from_slice(bytes).map_err(|_| {
            CertError::Decode(format!("group id has {} bytes, expected 16", bytes.len()))
        }),
        _ => Err(CertError::Decode("malformed organizational unit".into())),
    }
}

/// Decode every field the generator encodes. The issuer key is not part of
/// the encoding, so `issuer_public_key` is `None`.
pub fn parse_certificate(encoded: &[u8]) -> Result<Certificate, CertError> {
    let der = to_der(encoded)?;
    let cert = read_x509(&der)?;

    let issuer = decode_name(cert.issuer());
    let issuer_name = match find_attr(&issuer, OID_COMMON_NAME) {
        Some(cn) => utf8(cn.to_vec(), "issuer name")?,
        None => return Err(CertError::Decode("issuer has no common name".into())),
    };

    let subject = decode_name(cert.subject());
    let subject_cn = find_attr(&subject, OID_COMMON_NAME)
        .ok_or_else(|| CertError::Decode("subject has no common name".into()))?
        .to_vec();

    let extensions = decode_extensions(&cert)?;
    let cert_type = extensions
        .cert_type
        .ok_or_else(|| CertError::Decode("certificate type extension missing".into()))?;

    let kind = match cert_type {
        CertificateType::Identity => {
            let (alias, name) = extensions.alias_and_name.unwrap_or_default();
            CertificateKind::Identity { alias, name }
        }
        CertificateType::Membership => {
            let ou = find_attr(&subject, OID_ORGANIZATIONAL_UNIT).ok_or_else(|| {
                CertError::Decode("membership certificate has no group id".into())
            })?;
            let guild_id = Uuid::from_slice(ou)
                .map_err(|_| CertError::Decode("group id is not 16 bytes".into()))?;
            CertificateKind::Membership {
                guild_id,
                is_delegate: extensions.is_delegate,
            }
        }
        CertificateType::UserEquivalence => CertificateKind::UserEquivalence,
        CertificateType::Policy => CertificateKind::Policy,
    };

    Ok(Certificate {
        kind,
        serial_number: serial_magnitude(cert.tbs_certificate.raw_serial()),
        application_id: extensions.application_id.unwrap_or_else(Uuid::nil),
        issuer_name,
        issuer_public_key: None,
        subject_public_key: decode_subject_public_key(cert.public_key())?,
        subject_cn,
        data_digest: extensions.data_digest,
        validity: decode_validity(&cert),
        signature: cert.signature_value.data.to_vec(),
        encoded: der.to_vec(),
    })
}

/// Check `cert`'s signature against `issuer`.
pub fn verify_signature(cert: &Certificate, issuer: &PublicKey) -> Result<(), CertError> {
    if !cert.is_signed() {
        return Err(CertError::NotEncoded);
    }
    let der = to_der(&cert.encoded)?;
    let parsed = read_x509(&der)?;
    UnparsedPublicKey::new(&ECDSA_P256_SHA256_ASN1, issuer.to_uncompressed_point())
        .verify(
            parsed.tbs_certificate.as_ref(),
            &parsed.signature_value.data,
        )
        .map_err(|_| CertError::BadSignature {
            issuer: issuer.to_string(),
        })
}
