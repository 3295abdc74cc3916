//! User-facing outcome classes

use serde::Serialize;

use crate::authz::{AuthzError, Decision, DenialReason};
use crate::types::Operation;

/// Response class for a decision or failure
///
/// Only `Forbidden` and `NotFound` are derived from expected denials; the
/// rest carry a generic message and never expose the underlying reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Allowed,
    BadRequest,
    Forbidden,
    NotFound,
    Internal,
    Unavailable,
}

impl ResponseKind {
    /// Classify a decision for `operation`
    ///
    /// Denied reads look exactly like missing records.
    #[must_use]
    pub const fn for_decision(operation: Operation, decision: &Decision) -> Self {
        let Some(reason) = &decision.reason else {
            return Self::Allowed;
        };
        if operation.is_read() {
            return Self::NotFound;
        }
        match reason {
            DenialReason::NotAMember | DenialReason::InsufficientPermission { .. } => {
                Self::Forbidden
            }
            DenialReason::ModuleDisabled { .. } => Self::NotFound,
            DenialReason::UnresolvableOwner { .. } => Self::Internal,
        }
    }

    #[must_use]
    pub const fn for_error(error: &AuthzError) -> Self {
        if error.is_bad_request() {
            Self::BadRequest
        } else if error.is_retryable() {
            Self::Unavailable
        } else {
            Self::Internal
        }
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Allowed => 200,
            Self::BadRequest => 400,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::Internal => 500,
            Self::Unavailable => 503,
        }
    }

    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Allowed => "ok",
            Self::BadRequest => "bad request",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not found",
            Self::Internal => "internal error",
            Self::Unavailable => "service unavailable, retry later",
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }
}
