//! Authorization core
//!
//! Resolves a requester's standing in an organization and evaluates the
//! collection rules against it.
//!
//! # Decision flow
//!
//! 1. Collections of a module disabled by the deployment stage are denied.
//! 2. Open rules (organization creation) allow without further lookups.
//! 3. The record's owner references are followed up to its organization.
//! 4. The requester's role is resolved; no standing denies with `NotAMember`.
//! 5. The rule's clauses are OR-ed; no match denies with
//!    `InsufficientPermission`.
//!
//! The same rules compile into [`RowFilter`]s, so list results agree with
//! single-record `view` decisions.

mod error;
mod evaluator;
mod filter;
mod membership;
mod policy;
mod role;
mod rule;

pub use error::{AuthzError, DenialReason, Result};
pub use evaluator::{Decision, Evaluator, Listing};
pub use filter::{FieldMatch, RowField, RowFilter};
pub use membership::MembershipResolver;
pub use policy::{PolicySet, RuleOverride};
pub use role::{Role, has_min_role};
pub use rule::{Clause, RecordFacts, Rule};
