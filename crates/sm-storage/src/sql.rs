// sql.rs — SQLite-backed Storage.
//
// One connection behind a mutex; every trait method runs inside a single
// IMMEDIATE transaction so a failed call rolls back completely and
// concurrent callers are serialized by the lock.

use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use sm_cert::pem::to_der;
use sm_cert::{parse_certificate, Certificate, CertificateKind, CertificateType};
use sm_model::{
    ApplicationInfo, ClaimState, GroupInfo, IdentityInfo, PublicKey, RunningState,
    ECC_PUBLIC_KEY_SIZE,
};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::error::StorageError;
use crate::storage::Storage;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS CLAIMED_APPLICATIONS (
    APPLICATION_PUBKEY BLOB PRIMARY KEY NOT NULL,
    APP_NAME TEXT NOT NULL,
    DEV_NAME TEXT NOT NULL,
    USER_DEF_NAME TEXT NOT NULL,
    PEER_ID BLOB NOT NULL,
    ROOTS_OF_TRUST BLOB NOT NULL,
    KEY_IDENTIFIER BLOB
);
CREATE TABLE IF NOT EXISTS CERTIFICATES (
    APPLICATION_PUBKEY BLOB NOT NULL,
    TYPE TEXT NOT NULL,
    SERIAL BLOB NOT NULL,
    ISSUER_PUBKEY BLOB,
    DER BLOB NOT NULL,
    PRIMARY KEY (APPLICATION_PUBKEY, TYPE)
);
CREATE TABLE IF NOT EXISTS MEMBERSHIPS (
    APPLICATION_PUBKEY BLOB NOT NULL,
    GUILD_ID BLOB NOT NULL,
    SERIAL BLOB NOT NULL,
    ISSUER_PUBKEY BLOB,
    DER BLOB NOT NULL,
    PRIMARY KEY (APPLICATION_PUBKEY, GUILD_ID)
);
CREATE TABLE IF NOT EXISTS POLICIES (
    APPLICATION_PUBKEY BLOB PRIMARY KEY NOT NULL,
    POLICY BLOB NOT NULL
);
CREATE TABLE IF NOT EXISTS GUILDS (
    AUTHORITY BLOB NOT NULL,
    ID BLOB NOT NULL,
    NAME TEXT NOT NULL,
    DESCRIPTION TEXT NOT NULL,
    PRIMARY KEY (AUTHORITY, ID)
);
CREATE TABLE IF NOT EXISTS IDENTITIES (
    AUTHORITY BLOB NOT NULL,
    ID BLOB NOT NULL,
    NAME TEXT NOT NULL,
    PRIMARY KEY (AUTHORITY, ID)
);
";

const APPLICATION_COLUMNS: &str = "APPLICATION_PUBKEY, APP_NAME, DEV_NAME, USER_DEF_NAME, \
     PEER_ID, ROOTS_OF_TRUST, KEY_IDENTIFIER";

/// A claimed-application row as stored, before its blobs are checked.
struct ApplicationRow {
    public_key: Vec<u8>,
    app_name: String,
    device_name: String,
    user_defined_name: String,
    peer_id: Vec<u8>,
    roots_of_trust: Vec<u8>,
    key_identifier: Option<Vec<u8>>,
}

impl ApplicationRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            public_key: row.get(0)?,
            app_name: row.get(1)?,
            device_name: row.get(2)?,
            user_defined_name: row.get(3)?,
            peer_id: row.get(4)?,
            roots_of_trust: row.get(5)?,
            key_identifier: row.get(6)?,
        })
    }

    /// Stored applications are claimed by definition; whether they are
    /// running, and on which bus name, is only known from a live session.
    fn into_info(self) -> Result<ApplicationInfo, StorageError> {
        let mut roots_of_trust = Vec::new();
        let chunks = self.roots_of_trust.chunks_exact(ECC_PUBLIC_KEY_SIZE);
        if !chunks.remainder().is_empty() {
            return Err(StorageError::Corrupt(format!(
                "roots of trust blob has {} bytes",
                self.roots_of_trust.len()
            )));
        }
        for chunk in chunks {
            roots_of_trust.push(decode_key(chunk, "ROOTS_OF_TRUST")?);
        }

        Ok(ApplicationInfo {
            public_key: decode_key(&self.public_key, "APPLICATION_PUBKEY")?,
            bus_name: String::new(),
            user_defined_name: self.user_defined_name,
            device_name: self.device_name,
            app_name: self.app_name,
            peer_id: decode_uuid(&self.peer_id, "PEER_ID")?,
            roots_of_trust,
            key_identifier: self.key_identifier,
            claim_state: ClaimState::Claimed,
            running_state: RunningState::Unknown,
        })
    }
}

fn decode_key(bytes: &[u8], column: &str) -> Result<PublicKey, StorageError> {
    PublicKey::from_bytes(bytes).map_err(|e| StorageError::Corrupt(format!("{column}: {e}")))
}

fn decode_uuid(bytes: &[u8], column: &str) -> Result<Uuid, StorageError> {
    Uuid::from_slice(bytes).map_err(|e| StorageError::Corrupt(format!("{column}: {e}")))
}

/// DER and issuer key columns of a certificate row.
type CertificateRow = (Vec<u8>, Option<Vec<u8>>);

fn read_certificate(row: &Row<'_>) -> rusqlite::Result<CertificateRow> {
    Ok((row.get(0)?, row.get(1)?))
}

/// Parse the stored DER and put back the issuer key kept beside it.
fn into_certificate((der, issuer): CertificateRow) -> Result<Certificate, StorageError> {
    let mut cert = parse_certificate(&der)?;
    cert.issuer_public_key = issuer
        .map(|bytes| decode_key(&bytes, "ISSUER_PUBKEY"))
        .transpose()?;
    Ok(cert)
}

fn reject_membership(cert_type: CertificateType) -> Result<(), StorageError> {
    if cert_type == CertificateType::Membership {
        return Err(StorageError::BadArgument(
            "membership certificates are stored per group".into(),
        ));
    }
    Ok(())
}

fn read_group(row: &Row<'_>) -> rusqlite::Result<(Vec<u8>, Vec<u8>, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn into_group(
    (authority, id, name, description): (Vec<u8>, Vec<u8>, String, String),
) -> Result<GroupInfo, StorageError> {
    let guid = decode_uuid(&id, "GUILDS.ID")?;
    let authority = decode_key(&authority, "GUILDS.AUTHORITY")?;
    Ok(GroupInfo::new(guid, authority)
        .with_name(name)
        .with_description(description))
}

fn read_identity(row: &Row<'_>) -> rusqlite::Result<(Vec<u8>, Vec<u8>, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn into_identity(
    (authority, id, name): (Vec<u8>, Vec<u8>, String),
) -> Result<IdentityInfo, StorageError> {
    let guid = decode_uuid(&id, "IDENTITIES.ID")?;
    let authority = decode_key(&authority, "IDENTITIES.AUTHORITY")?;
    Ok(IdentityInfo::new(guid, authority).with_name(name))
}

/// SQLite implementation of [`Storage`].
pub struct SqlStorage {
    conn: Mutex<Connection>,
    location: String,
}

impl std::fmt::Debug for SqlStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlStorage")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl SqlStorage {
    /// Open (or create) the database file named by `config`.
    pub fn open(config: &StorageConfig) -> Result<Self, StorageError> {
        let location = config.path.display().to_string();
        let conn = Connection::open(&config.path).map_err(|source| StorageError::Open {
            path: location.clone(),
            source,
        })?;
        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
        Self::init(conn, location)
    }

    /// A private database that disappears when dropped.
    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|source| StorageError::Open {
            path: ":memory:".into(),
            source,
        })?;
        Self::init(conn, ":memory:".into())
    }

    fn init(conn: Connection, location: String) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        tracing::info!(location = %location, "storage opened");
        Ok(Self {
            conn: Mutex::new(conn),
            location,
        })
    }

    /// Run `f` inside one transaction. Errors from `f` or from the commit
    /// roll everything back.
    fn with_transaction<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&Transaction<'_>) -> Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let Ok(mut conn) = self.conn.lock() else {
            tracing::error!(operation, "storage lock poisoned");
            return Err(StorageError::LockPoisoned);
        };

        let result = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)
            .and_then(|tx| {
                let value = f(&tx)?;
                tx.commit()?;
                Ok(value)
            });

        if let Err(e) = &result {
            if matches!(e, StorageError::Engine(_)) {
                tracing::error!(operation, error = %e, "storage operation failed");
            }
        }
        result
    }
}

impl Storage for SqlStorage {
    fn track_claimed_application(&self, app: &ApplicationInfo) -> Result<(), StorageError> {
        if app.public_key.is_empty() {
            return Err(StorageError::BadArgument("application has no public key".into()));
        }
        let roots: Vec<u8> = app.roots_of_trust.iter().flat_map(|k| k.to_bytes()).collect();

        self.with_transaction("track_claimed_application", |tx| {
            tx.execute(
                &format!(
                    "INSERT INTO CLAIMED_APPLICATIONS ({APPLICATION_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(APPLICATION_PUBKEY) DO UPDATE SET
                         APP_NAME = excluded.APP_NAME,
                         DEV_NAME = excluded.DEV_NAME,
                         USER_DEF_NAME = excluded.USER_DEF_NAME,
                         PEER_ID = excluded.PEER_ID,
                         ROOTS_OF_TRUST = excluded.ROOTS_OF_TRUST,
                         KEY_IDENTIFIER = excluded.KEY_IDENTIFIER"
                ),
                params![
                    app.public_key.to_bytes().as_slice(),
                    app.app_name,
                    app.device_name,
                    app.user_defined_name,
                    app.peer_id.as_bytes().as_slice(),
                    roots,
                    app.key_identifier,
                ],
            )?;
            Ok(())
        })?;

        tracing::debug!(application = %app.public_key, "tracked claimed application");
        Ok(())
    }

    fn untrack_claimed_application(&self, app: &ApplicationInfo) -> Result<(), StorageError> {
        let key = app.public_key.to_bytes();
        let removed = self.with_transaction("untrack_claimed_application", |tx| {
            let mut rows = 0;
            for table in ["CERTIFICATES", "MEMBERSHIPS", "POLICIES", "CLAIMED_APPLICATIONS"] {
                rows += tx.execute(
                    &format!("DELETE FROM {table} WHERE APPLICATION_PUBKEY = ?1"),
                    params![key.as_slice()],
                )?;
            }
            Ok(rows)
        })?;

        tracing::debug!(
            application = %app.public_key,
            rows = removed,
            "untracked claimed application"
        );
        Ok(())
    }

    fn get_claimed_applications(&self) -> Result<Vec<ApplicationInfo>, StorageError> {
        let rows = self.with_transaction("get_claimed_applications", |tx| {
            let mut stmt = tx.prepare(&format!(
                "SELECT {APPLICATION_COLUMNS} FROM CLAIMED_APPLICATIONS \
                 ORDER BY APPLICATION_PUBKEY"
            ))?;
            let rows = stmt
                .query_map([], ApplicationRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(ApplicationRow::into_info).collect()
    }

    fn get_claimed_application(&self, key: &PublicKey) -> Result<ApplicationInfo, StorageError> {
        let bytes = key.to_bytes();
        let row = self.with_transaction("get_claimed_application", |tx| {
            Ok(tx
                .query_row(
                    &format!(
                        "SELECT {APPLICATION_COLUMNS} FROM CLAIMED_APPLICATIONS \
                         WHERE APPLICATION_PUBKEY = ?1"
                    ),
                    params![bytes.as_slice()],
                    ApplicationRow::read,
                )
                .optional()?)
        })?;
        row.ok_or_else(|| StorageError::not_found(format!("claimed application {key}")))?
            .into_info()
    }

    fn is_claimed_application(&self, key: &PublicKey) -> Result<bool, StorageError> {
        let bytes = key.to_bytes();
        self.with_transaction("is_claimed_application", |tx| {
            let found: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM CLAIMED_APPLICATIONS WHERE APPLICATION_PUBKEY = ?1",
                    params![bytes.as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    fn store_certificate(&self, key: &PublicKey, cert: &Certificate) -> Result<(), StorageError> {
        if !cert.is_signed() {
            return Err(StorageError::BadArgument(format!(
                "{} certificate has no encoded form",
                cert.cert_type()
            )));
        }
        let der = to_der(&cert.encoded)?;
        let issuer = cert.issuer_public_key.map(|k| k.to_bytes().to_vec());
        let bytes = key.to_bytes();
        let cert_type = cert.cert_type();

        self.with_transaction("store_certificate", |tx| {
            match &cert.kind {
                CertificateKind::Membership { guild_id, .. } => tx.execute(
                    "INSERT INTO MEMBERSHIPS
                         (APPLICATION_PUBKEY, GUILD_ID, SERIAL, ISSUER_PUBKEY, DER)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(APPLICATION_PUBKEY, GUILD_ID) DO UPDATE SET
                         SERIAL = excluded.SERIAL,
                         ISSUER_PUBKEY = excluded.ISSUER_PUBKEY,
                         DER = excluded.DER",
                    params![
                        bytes.as_slice(),
                        guild_id.as_bytes().as_slice(),
                        cert.serial_number,
                        issuer,
                        der,
                    ],
                )?,
                _ => tx.execute(
                    "INSERT INTO CERTIFICATES
                         (APPLICATION_PUBKEY, TYPE, SERIAL, ISSUER_PUBKEY, DER)
                     VALUES (?1, ?2, ?3, ?4, ?5)
                     ON CONFLICT(APPLICATION_PUBKEY, TYPE) DO UPDATE SET
                         SERIAL = excluded.SERIAL,
                         ISSUER_PUBKEY = excluded.ISSUER_PUBKEY,
                         DER = excluded.DER",
                    params![
                        bytes.as_slice(),
                        cert_type.as_str(),
                        cert.serial_number,
                        issuer,
                        der,
                    ],
                )?,
            };
            Ok(())
        })?;

        tracing::debug!(application = %key, cert_type = %cert_type, "stored certificate");
        Ok(())
    }

    fn remove_certificate(
        &self,
        key: &PublicKey,
        cert_type: CertificateType,
    ) -> Result<(), StorageError> {
        reject_membership(cert_type)?;
        let bytes = key.to_bytes();
        self.with_transaction("remove_certificate", |tx| {
            tx.execute(
                "DELETE FROM CERTIFICATES WHERE APPLICATION_PUBKEY = ?1 AND TYPE = ?2",
                params![bytes.as_slice(), cert_type.as_str()],
            )?;
            Ok(())
        })
    }

    fn get_certificate(
        &self,
        key: &PublicKey,
        cert_type: CertificateType,
    ) -> Result<Certificate, StorageError> {
        reject_membership(cert_type)?;
        let bytes = key.to_bytes();
        let row = self.with_transaction("get_certificate", |tx| {
            Ok(tx
                .query_row(
                    "SELECT DER, ISSUER_PUBKEY FROM CERTIFICATES
                     WHERE APPLICATION_PUBKEY = ?1 AND TYPE = ?2",
                    params![bytes.as_slice(), cert_type.as_str()],
                    read_certificate,
                )
                .optional()?)
        })?;

        let row = row
            .ok_or_else(|| StorageError::not_found(format!("{cert_type} certificate for {key}")))?;
        into_certificate(row)
    }

    fn get_membership_certificates(
        &self,
        key: &PublicKey,
    ) -> Result<Vec<Certificate>, StorageError> {
        let bytes = key.to_bytes();
        let rows = self.with_transaction("get_membership_certificates", |tx| {
            let mut stmt = tx.prepare(
                "SELECT DER, ISSUER_PUBKEY FROM MEMBERSHIPS
                 WHERE APPLICATION_PUBKEY = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![bytes.as_slice()], read_certificate)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(into_certificate).collect()
    }

    fn get_membership_certificate(
        &self,
        key: &PublicKey,
        guild_id: Uuid,
    ) -> Result<Certificate, StorageError> {
        let bytes = key.to_bytes();
        let row = self.with_transaction("get_membership_certificate", |tx| {
            Ok(tx
                .query_row(
                    "SELECT DER, ISSUER_PUBKEY FROM MEMBERSHIPS
                     WHERE APPLICATION_PUBKEY = ?1 AND GUILD_ID = ?2",
                    params![bytes.as_slice(), guild_id.as_bytes().as_slice()],
                    read_certificate,
                )
                .optional()?)
        })?;

        let row = row.ok_or_else(|| {
            StorageError::not_found(format!("membership of group {guild_id} for {key}"))
        })?;
        into_certificate(row)
    }

    fn remove_membership_certificate(
        &self,
        key: &PublicKey,
        guild_id: Uuid,
    ) -> Result<(), StorageError> {
        let bytes = key.to_bytes();
        self.with_transaction("remove_membership_certificate", |tx| {
            tx.execute(
                "DELETE FROM MEMBERSHIPS WHERE APPLICATION_PUBKEY = ?1 AND GUILD_ID = ?2",
                params![bytes.as_slice(), guild_id.as_bytes().as_slice()],
            )?;
            Ok(())
        })?;
        tracing::debug!(application = %key, group = %guild_id, "removed membership certificate");
        Ok(())
    }

    fn store_policy(&self, key: &PublicKey, policy: &[u8]) -> Result<(), StorageError> {
        if policy.is_empty() {
            return Err(StorageError::BadArgument("policy is empty".into()));
        }
        let bytes = key.to_bytes();
        self.with_transaction("store_policy", |tx| {
            tx.execute(
                "INSERT INTO POLICIES (APPLICATION_PUBKEY, POLICY) VALUES (?1, ?2)
                 ON CONFLICT(APPLICATION_PUBKEY) DO UPDATE SET POLICY = excluded.POLICY",
                params![bytes.as_slice(), policy],
            )?;
            Ok(())
        })?;
        tracing::debug!(application = %key, size = policy.len(), "stored policy");
        Ok(())
    }

    fn get_policy(&self, key: &PublicKey) -> Result<Vec<u8>, StorageError> {
        let bytes = key.to_bytes();
        let policy: Option<Vec<u8>> = self.with_transaction("get_policy", |tx| {
            Ok(tx
                .query_row(
                    "SELECT POLICY FROM POLICIES WHERE APPLICATION_PUBKEY = ?1",
                    params![bytes.as_slice()],
                    |row| row.get(0),
                )
                .optional()?)
        })?;
        policy.ok_or_else(|| StorageError::not_found(format!("policy for {key}")))
    }

    fn reset(&self) -> Result<(), StorageError> {
        self.with_transaction("reset", |tx| {
            tx.execute_batch(
                "DELETE FROM CERTIFICATES;
                 DELETE FROM MEMBERSHIPS;
                 DELETE FROM POLICIES;
                 DELETE FROM CLAIMED_APPLICATIONS;
                 DELETE FROM GUILDS;
                 DELETE FROM IDENTITIES;",
            )?;
            Ok(())
        })?;
        tracing::info!(location = %self.location, "storage reset");
        Ok(())
    }

    fn store_group(&self, group: &GroupInfo) -> Result<(), StorageError> {
        let authority = group.authority.to_bytes();
        self.with_transaction("store_group", |tx| {
            tx.execute(
                "INSERT INTO GUILDS (AUTHORITY, ID, NAME, DESCRIPTION) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(AUTHORITY, ID) DO UPDATE SET
                     NAME = excluded.NAME,
                     DESCRIPTION = excluded.DESCRIPTION",
                params![
                    authority.as_slice(),
                    group.guid.as_bytes().as_slice(),
                    group.name,
                    group.description,
                ],
            )?;
            Ok(())
        })
    }

    fn remove_group(&self, authority: &PublicKey, guid: Uuid) -> Result<(), StorageError> {
        let authority = authority.to_bytes();
        self.with_transaction("remove_group", |tx| {
            tx.execute(
                "DELETE FROM GUILDS WHERE AUTHORITY = ?1 AND ID = ?2",
                params![authority.as_slice(), guid.as_bytes().as_slice()],
            )?;
            Ok(())
        })
    }

    fn get_group(&self, authority: &PublicKey, guid: Uuid) -> Result<GroupInfo, StorageError> {
        let authority_bytes = authority.to_bytes();
        let row = self.with_transaction("get_group", |tx| {
            Ok(tx
                .query_row(
                    "SELECT AUTHORITY, ID, NAME, DESCRIPTION FROM GUILDS
                     WHERE AUTHORITY = ?1 AND ID = ?2",
                    params![authority_bytes.as_slice(), guid.as_bytes().as_slice()],
                    read_group,
                )
                .optional()?)
        })?;
        into_group(row.ok_or_else(|| StorageError::not_found(format!("group {guid}")))?)
    }

    fn get_groups(&self) -> Result<Vec<GroupInfo>, StorageError> {
        let rows = self.with_transaction("get_groups", |tx| {
            let mut stmt = tx.prepare(
                "SELECT AUTHORITY, ID, NAME, DESCRIPTION FROM GUILDS ORDER BY AUTHORITY, ID",
            )?;
            let rows = stmt
                .query_map([], read_group)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(into_group).collect()
    }

    fn store_identity(&self, identity: &IdentityInfo) -> Result<(), StorageError> {
        let authority = identity.authority.to_bytes();
        self.with_transaction("store_identity", |tx| {
            tx.execute(
                "INSERT INTO IDENTITIES (AUTHORITY, ID, NAME) VALUES (?1, ?2, ?3)
                 ON CONFLICT(AUTHORITY, ID) DO UPDATE SET NAME = excluded.NAME",
                params![
                    authority.as_slice(),
                    identity.guid.as_bytes().as_slice(),
                    identity.name,
                ],
            )?;
            Ok(())
        })
    }

    fn remove_identity(&self, authority: &PublicKey, guid: Uuid) -> Result<(), StorageError> {
        let authority = authority.to_bytes();
        self.with_transaction("remove_identity", |tx| {
            tx.execute(
                "DELETE FROM IDENTITIES WHERE AUTHORITY = ?1 AND ID = ?2",
                params![authority.as_slice(), guid.as_bytes().as_slice()],
            )?;
            Ok(())
        })
    }

    fn get_identity(
        &self,
        authority: &PublicKey,
        guid: Uuid,
    ) -> Result<IdentityInfo, StorageError> {
        let authority_bytes = authority.to_bytes();
        let row = self.with_transaction("get_identity", |tx| {
            Ok(tx
                .query_row(
                    "SELECT AUTHORITY, ID, NAME FROM IDENTITIES WHERE AUTHORITY = ?1 AND ID = ?2",
                    params![authority_bytes.as_slice(), guid.as_bytes().as_slice()],
                    read_identity,
                )
                .optional()?)
        })?;
        into_identity(row.ok_or_else(|| StorageError::not_found(format!("identity {guid}")))?)
    }

    fn get_identities(&self) -> Result<Vec<IdentityInfo>, StorageError> {
        let rows = self.with_transaction("get_identities", |tx| {
            let mut stmt =
                tx.prepare("SELECT AUTHORITY, ID, NAME FROM IDENTITIES ORDER BY AUTHORITY, ID")?;
            let rows = stmt
                .query_map([], read_identity)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        rows.into_iter().map(into_identity).collect()
    }
}
