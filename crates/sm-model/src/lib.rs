//! # sm-model
//!
//! Value types shared by every part of the security manager.
//!
//! ## Key types
//!
//! - [`PublicKey`]: a P-256 key as raw `x`/`y` coordinates; the identity
//!   of every managed application
//! - [`ApplicationInfo`]: a managed application, with its claim-state
//!   machine ([`ClaimState`]) and claim guard
//! - [`GroupInfo`] / [`IdentityInfo`]: security groups and user identities
//! - [`ErrorKind`]: the failure taxonomy every crate's error maps onto

pub mod application;
pub mod error;
pub mod group;
pub mod key;

pub use application::{ApplicationInfo, ClaimState, RunningState};
pub use error::{ErrorKind, ModelError};
pub use group::{GroupInfo, IdentityInfo};
pub use key::{PublicKey, ECC_COORDINATE_SIZE, ECC_PUBLIC_KEY_SIZE};
