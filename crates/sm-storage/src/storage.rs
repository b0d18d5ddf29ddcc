// storage.rs — The Storage trait: what the manager persists.
//
// Records are keyed by application public key. Each application has at
// most one identity, policy and user-equivalence certificate; storing
// another of the same type replaces it. Membership certificates are kept
// one per group. Every operation is atomic: a failed call leaves nothing
// half-written.

use sm_cert::{Certificate, CertificateType};
use sm_model::{ApplicationInfo, GroupInfo, IdentityInfo, PublicKey};
use uuid::Uuid;

use crate::error::StorageError;

/// Persistent claim, certificate, policy, group and identity records.
///
/// Implementations must be safe to call from several threads at once;
/// operations on different applications must not corrupt each other.
pub trait Storage: Send + Sync {
    /// Insert or update the record for `app.public_key`.
    fn track_claimed_application(&self, app: &ApplicationInfo) -> Result<(), StorageError>;

    /// Remove the application with all of its certificates and its policy.
    /// Absent applications are not an error.
    fn untrack_claimed_application(&self, app: &ApplicationInfo) -> Result<(), StorageError>;

    fn get_claimed_applications(&self) -> Result<Vec<ApplicationInfo>, StorageError>;

    /// The tracked application with this key, or `NotFound`.
    fn get_claimed_application(&self, key: &PublicKey) -> Result<ApplicationInfo, StorageError>;

    fn is_claimed_application(&self, key: &PublicKey) -> Result<bool, StorageError>;

    /// Insert or replace the certificate of `cert`'s type for `key`. A
    /// membership certificate replaces only the one for its own group.
    fn store_certificate(&self, key: &PublicKey, cert: &Certificate) -> Result<(), StorageError>;

    /// Remove the certificate of this type. Memberships are removed per
    /// group with [`Storage::remove_membership_certificate`].
    fn remove_certificate(
        &self,
        key: &PublicKey,
        cert_type: CertificateType,
    ) -> Result<(), StorageError>;

    /// The stored certificate, or `NotFound`. Memberships are read with
    /// [`Storage::get_membership_certificates`].
    fn get_certificate(
        &self,
        key: &PublicKey,
        cert_type: CertificateType,
    ) -> Result<Certificate, StorageError>;

    /// Membership certificates of `key`, in the order they were first
    /// stored.
    fn get_membership_certificates(
        &self,
        key: &PublicKey,
    ) -> Result<Vec<Certificate>, StorageError>;

    /// The membership certificate of `key` for one group, or `NotFound`.
    fn get_membership_certificate(
        &self,
        key: &PublicKey,
        guild_id: Uuid,
    ) -> Result<Certificate, StorageError>;

    fn remove_membership_certificate(
        &self,
        key: &PublicKey,
        guild_id: Uuid,
    ) -> Result<(), StorageError>;

    /// Insert or replace the marshalled policy installed on `key`.
    fn store_policy(&self, key: &PublicKey, policy: &[u8]) -> Result<(), StorageError>;

    /// The marshalled policy of `key`, or `NotFound`.
    fn get_policy(&self, key: &PublicKey) -> Result<Vec<u8>, StorageError>;

    /// Delete everything. Irreversible.
    fn reset(&self) -> Result<(), StorageError>;

    fn store_group(&self, group: &GroupInfo) -> Result<(), StorageError>;
    fn remove_group(&self, authority: &PublicKey, guid: Uuid) -> Result<(), StorageError>;
    fn get_group(&self, authority: &PublicKey, guid: Uuid) -> Result<GroupInfo, StorageError>;
    fn get_groups(&self) -> Result<Vec<GroupInfo>, StorageError>;

    fn store_identity(&self, identity: &IdentityInfo) -> Result<(), StorageError>;
    fn remove_identity(&self, authority: &PublicKey, guid: Uuid) -> Result<(), StorageError>;
    fn get_identity(
        &self,
        authority: &PublicKey,
        guid: Uuid,
    ) -> Result<IdentityInfo, StorageError>;
    fn get_identities(&self) -> Result<Vec<IdentityInfo>, StorageError>;
}
