//! # sm-cert
//!
//! X.509 elliptic-curve certificates issued by the security manager.
//!
//! Four certificate types share one base ([`Certificate`]); the
//! type-specific content is the [`CertificateKind`] variant. The
//! [`CertificateGenerator`] builds identity and membership certificates and
//! has them signed by a [`Signer`]; the [`parser`] functions take encoded
//! certificates (DER or PEM) apart again.
//!
//! ## Key invariants
//!
//! - **Back-dated validity**: certificates issued at `T` for `S` seconds
//!   are valid from `T - 3600` to `T + S`. A zero period is refused.
//! - **Parse inverts generate**: every field the generator encodes is
//!   recovered by [`parse_certificate`]; only the issuer key (kept beside
//!   the DER by storage) is not.
//! - **No hidden side effects**: issuing a certificate never persists it.
//!
//! ## Modules
//!
//! - [`asn1`]: pattern-driven DER encoder/decoder over the `der` crate
//! - [`parser`]: reads certificates back with `x509-parser`
//! - [`pem`]: PEM framing via the `pem` crate
//! - [`digest`]: SHA-256, key identifiers
//! - [`x509`]: certificate layout, OIDs, time encoding

pub mod asn1;
pub mod certificate;
pub mod digest;
pub mod error;
pub mod generator;
pub mod parser;
pub mod pem;
pub mod signer;
pub mod x509;

pub use certificate::{
    new_serial_number, Certificate, CertificateKind, CertificateType, Validity, CLOCK_SKEW_SECS,
};
pub use digest::key_identifier;
pub use error::CertError;
pub use generator::CertificateGenerator;
pub use parser::{
    get_group_id, get_serial_number, get_validity, parse_certificate, verify_signature,
};
pub use signer::{EcdsaSigner, Signer};
