//! # sm-storage
//!
//! Persistent records of the security manager: which applications are
//! claimed, which certificates and policy are installed on them, and the
//! group and identity registries the certificates are issued from.
//!
//! [`Storage`] is the capability the rest of the manager depends on;
//! [`SqlStorage`] implements it on SQLite.
//!
//! ## Key invariants
//!
//! - **Keyed by public key**: an application's public key is its primary
//!   key; tracking the same key twice updates one record.
//! - **One certificate per type**: storing a certificate replaces any
//!   previous certificate of the same type for that application. The
//!   exception is membership, where the slot is per group.
//! - **Atomic operations**: every call is one transaction. A failure
//!   leaves the previous state visible to later reads.

pub mod config;
pub mod error;
pub mod sql;
pub mod storage;

pub use config::StorageConfig;
pub use error::StorageError;
pub use sql::SqlStorage;
pub use storage::Storage;
