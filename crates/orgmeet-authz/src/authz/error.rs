//! Authorization error and denial types

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::Module;
use crate::store::StoreError;
use crate::types::{Collection, Operation, RecordId};

/// Failures that prevent a decision from being made
#[derive(Debug, Error)]
pub enum AuthzError {
    #[error("invalid role: {0}")]
    InvalidRole(String),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("invalid collection: {0}")]
    InvalidCollection(String),

    #[error("invalid {field}: {reason}")]
    InvalidIdentifier {
        field: &'static str,
        reason: &'static str,
    },

    #[error("missing required field `{field}` for {collection}")]
    MissingField {
        collection: Collection,
        field: &'static str,
    },

    #[error("{operation} must reference a stored record by id; inline records are accepted only for create")]
    InlineTarget { operation: Operation },

    #[error("membership resolution failed: {0}")]
    ResolutionFailed(#[from] StoreError),
}

impl AuthzError {
    /// Malformed input supplied at the request boundary
    #[must_use]
    pub const fn is_bad_request(&self) -> bool {
        matches!(
            self,
            Self::InvalidRole(_)
                | Self::InvalidOperation(_)
                | Self::InvalidCollection(_)
                | Self::InvalidIdentifier { .. }
                | Self::MissingField { .. }
                | Self::InlineTarget { .. }
        )
    }

    /// Infrastructure failure; the caller may retry
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ResolutionFailed(_))
    }
}

/// Why a request was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DenialReason {
    /// No ownership and no active membership in the record's organization
    NotAMember,
    /// Standing exists but no clause of the rule matched
    InsufficientPermission {
        operation: Operation,
        /// Clauses that would have satisfied the rule (diagnostics only)
        required: String,
    },
    /// Ownership chain of the record is broken
    UnresolvableOwner { record: RecordId },
    /// Collection belongs to a module not enabled in this deployment stage
    ModuleDisabled { module: Module },
}

impl DenialReason {
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotAMember => "not_a_member",
            Self::InsufficientPermission { .. } => "insufficient_permission",
            Self::UnresolvableOwner { .. } => "unresolvable_owner",
            Self::ModuleDisabled { .. } => "module_disabled",
        }
    }

    /// Only these outcomes are stable enough to show to end users
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(self, Self::NotAMember | Self::InsufficientPermission { .. })
    }

    /// Integrity faults are logged for investigation rather than surfaced
    #[must_use]
    pub const fn is_integrity_fault(&self) -> bool {
        matches!(self, Self::UnresolvableOwner { .. })
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAMember => write!(f, "requester is not a member of the organization"),
            Self::InsufficientPermission {
                operation,
                required,
            } => write!(f, "insufficient permission to {operation}: requires {required}"),
            Self::UnresolvableOwner { record } => {
                write!(f, "record {record} has no resolvable owning organization")
            }
            Self::ModuleDisabled { module } => write!(f, "module {module} is not enabled"),
        }
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authz_error_display() {
        assert_eq!(
            AuthzError::InvalidRole("root".into()).to_string(),
            "invalid role: root"
        );
        let err = AuthzError::MissingField {
            collection: Collection::Notifications,
            field: "recipient",
        };
        assert_eq!(
            err.to_string(),
            "missing required field `recipient` for notifications"
        );
    }

    #[test]
    fn test_error_classification() {
        assert!(AuthzError::InvalidOperation("x".into()).is_bad_request());
        assert!(!AuthzError::InvalidOperation("x".into()).is_retryable());

        let err = AuthzError::from(StoreError::Unavailable("timeout".into()));
        assert!(err.is_retryable());
        assert!(!err.is_bad_request());
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_denial_reason_user_facing() {
        assert!(DenialReason::NotAMember.is_user_facing());
        assert!(
            DenialReason::InsufficientPermission {
                operation: Operation::Delete,
                required: "admin".into(),
            }
            .is_user_facing()
        );
        let orphan = DenialReason::UnresolvableOwner {
            record: RecordId::new("m9"),
        };
        assert!(!orphan.is_user_facing());
        assert!(orphan.is_integrity_fault());
        assert!(
            !DenialReason::ModuleDisabled {
                module: Module::Voting
            }
            .is_user_facing()
        );
    }

    #[test]
    fn test_denial_reason_serde() {
        let reason = DenialReason::InsufficientPermission {
            operation: Operation::Delete,
            required: "org-owner or admin".into(),
        };
        let json = serde_json::to_value(&reason).unwrap();
        assert_eq!(json["kind"], "insufficient_permission");
        assert_eq!(json["operation"], "delete");
        assert_eq!(reason.code(), "insufficient_permission");

        let json = serde_json::to_value(DenialReason::NotAMember).unwrap();
        assert_eq!(json["kind"], "not_a_member");
    }
}
