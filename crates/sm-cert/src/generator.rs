// generator.rs — Issues identity and membership certificates.
//
// Issuance never touches storage: the caller decides whether and where a
// certificate is kept once the application has accepted it.

use std::sync::Arc;

use chrono::Utc;
use sm_model::{ApplicationInfo, GroupInfo, IdentityInfo};

use crate::certificate::{Certificate, CertificateKind, Validity};
use crate::digest::{key_identifier, to_hex};
use crate::error::CertError;
use crate::signer::Signer;

/// Builds certificates for managed applications and signs them with the
/// authority's [`Signer`].
#[derive(Clone)]
pub struct CertificateGenerator {
    issuer_name: String,
    signer: Arc<dyn Signer>,
}

impl CertificateGenerator {
    pub fn new(issuer_name: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            issuer_name: issuer_name.into(),
            signer,
        }
    }

    pub fn issuer_name(&self) -> &str {
        &self.issuer_name
    }

    pub fn issuer_public_key(&self) -> sm_model::PublicKey {
        self.signer.public_key()
    }

    /// Identity certificate binding `app`'s key to `identity`.
    pub fn generate_identity_certificate(
        &self,
        app: &ApplicationInfo,
        identity: &IdentityInfo,
        validity_secs: u64,
    ) -> Result<Certificate, CertError> {
        let kind = CertificateKind::Identity {
            alias: identity.guid.to_string(),
            name: identity.name.clone(),
        };
        self.issue(app, kind, validity_secs, Utc::now().timestamp())
    }

    /// Membership certificate admitting `app` to `group`.
    pub fn generate_membership_certificate(
        &self,
        app: &ApplicationInfo,
        group: &GroupInfo,
        validity_secs: u64,
    ) -> Result<Certificate, CertError> {
        let kind = CertificateKind::Membership {
            guild_id: group.guid,
            is_delegate: false,
        };
        self.issue(app, kind, validity_secs, Utc::now().timestamp())
    }

    fn issue(
        &self,
        app: &ApplicationInfo,
        kind: CertificateKind,
        validity_secs: u64,
        now: i64,
    ) -> Result<Certificate, CertError> {
        let validity = Validity::starting_at(now, validity_secs)?;

        let subject_cn = match app.announced_key_identifier() {
            Some(key_id) => key_id.to_vec(),
            None => key_identifier(&app.public_key)?,
        };

        let mut cert = Certificate::new(kind, app.public_key, subject_cn, validity);
        cert.issuer_name = self.issuer_name.clone();
        cert.application_id = app.peer_id;

        let cert = self.signer.sign_certificate(cert)?;
        tracing::debug!(
            cert_type = %cert.cert_type(),
            serial = %to_hex(&cert.serial_number),
            subject = %app.public_key,
            valid_to = cert.validity.valid_to,
            "issued certificate"
        );
        Ok(cert)
    }
}

impl std::fmt::Debug for CertificateGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateGenerator")
            .field("issuer_name", &self.issuer_name)
            .field("issuer_public_key", &self.signer.public_key().to_string())
            .finish()
    }
}
