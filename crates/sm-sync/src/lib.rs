//! # sm-sync
//!
//! Brings applications under management and keeps them in sync: claims
//! them, issues and installs identity and membership certificates, pushes
//! the default policy, records what was installed in [`Storage`], and takes
//! applications back out of groups.
//!
//! The bus is abstracted as a [`SecurityChannel`]; storage is any
//! [`Storage`] implementation.
//!
//! ## Key invariants
//!
//! - **Partial failure is reported, not fatal**: each failed step becomes
//!   one [`SyncError`] and the remaining steps still run.
//! - **Storage follows the device**: a certificate or policy is stored only
//!   after the application accepted it.
//! - **Applications are isolated**: [`Synchronizer::sync_fleet`] spreads the
//!   fleet over at most `sync_workers` threads; a failure or panic in one
//!   application leaves every other application's state untouched.
//! - **Tag and artifact agree**: a [`SyncError`]'s type is derived from the
//!   artifact it carries, never stored separately.
//!
//! [`Storage`]: sm_storage::Storage

pub mod channel;
pub mod config;
pub mod error;
pub mod sync_error;
pub mod synchronizer;

pub use channel::SecurityChannel;
pub use config::ManagerConfig;
pub use error::{ChannelError, ManagerError};
pub use sync_error::{SyncError, SyncErrorType, SyncFailure};
pub use synchronizer::{SyncPlan, SyncReport, Synchronizer};
