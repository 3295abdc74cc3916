//! Store error types

use thiserror::Error;

use crate::types::{Collection, OrgId, RecordId, UserId};

/// Store operation errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Active membership already exists for {user} in {organization}")]
    DuplicateMembership { user: UserId, organization: OrgId },

    #[error("No active membership for {user} in {organization}")]
    MembershipNotFound { user: UserId, organization: OrgId },

    #[error("User already exists: {0}")]
    DuplicateUser(UserId),

    #[error("Email already registered: {0}")]
    DuplicateEmail(String),

    #[error("Organization name already taken: {0}")]
    DuplicateOrganization(String),

    #[error("Record already exists: {0}")]
    DuplicateRecord(RecordId),

    #[error("Dangling reference from {record}: {target} does not exist")]
    DanglingReference { record: RecordId, target: String },

    #[error("Record {record}: {collection} records are derived and cannot be inserted")]
    DerivedCollection {
        record: RecordId,
        collection: Collection,
    },

    #[error("Unknown organization: {0}")]
    UnknownOrganization(OrgId),

    #[error("Snapshot error: {0}")]
    Snapshot(String),
}

impl StoreError {
    /// Constraint violations are caller mistakes, not outages
    #[must_use]
    pub const fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::DuplicateMembership { .. }
                | Self::DuplicateUser(_)
                | Self::DuplicateEmail(_)
                | Self::DuplicateOrganization(_)
                | Self::DuplicateRecord(_)
                | Self::DanglingReference { .. }
                | Self::DerivedCollection { .. }
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;
