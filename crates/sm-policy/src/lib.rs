//! # sm-policy
//!
//! Access-control policy documents for managed applications.
//!
//! A [`Policy`] is an ordered list of [`Acl`]s, each binding a set of
//! [`Peer`]s to a set of [`Rule`]s. This crate builds, canonicalizes, and
//! validates them; transmission is left to the caller.
//!
//! ## Key invariants
//!
//! - **Normalization is lossless and idempotent**: after
//!   [`normalize_policy`], no Acl has two Rules on the same
//!   `(interface, path)`, no Rule has two Members with the same
//!   `(name, type)`, and merged masks are the OR of their inputs.
//! - **Deny rules are well-formed**: a zero action mask only appears as a
//!   lone `*` member of a lone `*`/`*` rule in an Acl naming specific keys
//!   (see [`validate_deny_rules`]).
//! - **Generated policies always validate**: [`default_policy`] output
//!   passes deny validation for any input, and always ends with the deny Acl.

pub mod error;
pub mod generator;
pub mod marshal;
pub mod model;
pub mod normalize;

pub use error::PolicyError;
pub use generator::{default_policy, deny_acl, DEFAULT_POLICY_VERSION};
pub use marshal::{JsonPolicyMarshaller, PolicyMarshaller};
pub use model::{Acl, ActionMask, Member, MemberType, Peer, PeerType, Policy, Rule, WILDCARD};
pub use normalize::{has_valid_deny_rules, normalize_policy, validate_deny_rules};
