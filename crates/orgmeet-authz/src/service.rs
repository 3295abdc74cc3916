//! Decision service facade shared by the CLI and the HTTP transport

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::audit::{DenialSink, ResponseKind};
use crate::authz::{AuthzError, Decision, DenialReason, Evaluator, Listing, Result, Role};
use crate::config::Config;
use crate::constants::{STATUS_DEGRADED, STATUS_OK};
use crate::store::{AccessStore, StoreStats};
use crate::types::{Collection, OrgId, Operation, Record, RecordId, UserId};
use crate::validation::{validate_identifier, validate_request};
use crate::visibility::{Projector, UiElement, ViewerFacts};

/// Boundary outcome: a status class plus the reason when it is safe to show
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Enforcement {
    pub status: u16,
    pub outcome: ResponseKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl Enforcement {
    fn from_decision(operation: Operation, decision: Decision) -> Self {
        let outcome = ResponseKind::for_decision(operation, &decision);
        let reason = decision
            .reason
            .filter(|r| outcome == ResponseKind::Forbidden && r.is_user_facing());
        Self {
            status: outcome.status_code(),
            outcome,
            message: outcome.message().to_string(),
            reason,
        }
    }

    /// Same shape as a denied read, so absence and denial look alike
    fn not_found() -> Self {
        let outcome = ResponseKind::NotFound;
        Self {
            status: outcome.status_code(),
            outcome,
            message: outcome.message().to_string(),
            reason: None,
        }
    }

    fn from_error(error: &AuthzError) -> Self {
        let outcome = ResponseKind::for_error(error);
        let message = if outcome == ResponseKind::BadRequest {
            error.to_string()
        } else {
            outcome.message().to_string()
        };
        Self {
            status: outcome.status_code(),
            outcome,
            message,
            reason: None,
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.outcome.is_allowed()
    }
}

/// How a request names the record it acts on
///
/// Existing records are always judged on their stored fields; only a record
/// that does not exist yet may be described by the caller.
#[derive(Debug, Clone)]
pub enum Target {
    Stored(RecordId),
    Inline(Record),
}

/// Requester's role and control visibility in one organization
#[derive(Debug, Clone, Serialize)]
pub struct Visibility {
    pub role: Option<Role>,
    pub elements: std::collections::BTreeMap<UiElement, bool>,
}

/// Liveness report
#[derive(Debug, Clone, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub stats: StoreStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Validation, evaluation and projection behind one handle
#[derive(Clone)]
pub struct AuthzService {
    store: Arc<dyn AccessStore>,
    evaluator: Evaluator,
    projector: Projector,
}

impl fmt::Debug for AuthzService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthzService")
            .field("evaluator", &self.evaluator)
            .field("projector", &self.projector)
            .finish_non_exhaustive()
    }
}

impl AuthzService {
    /// Service over `store` with the configured policy and modules
    #[must_use]
    pub fn new(store: Arc<dyn AccessStore>, config: &Config) -> Self {
        let evaluator = Evaluator::new(Arc::clone(&store))
            .with_policy(Arc::clone(&config.policy))
            .with_features(Arc::clone(&config.features));
        let projector = Projector::new(config.features().clone());
        Self {
            store,
            evaluator,
            projector,
        }
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DenialSink>) -> Self {
        self.evaluator = self.evaluator.with_sink(sink);
        self
    }

    #[must_use]
    pub const fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Full diagnostic decision, including the denial reason
    pub fn check(&self, requester: &UserId, operation: Operation, record: &Record) -> Result<Decision> {
        validate_identifier(requester.as_str(), "requester")?;
        validate_request(operation, record)?;
        self.evaluator.authorize(requester, operation, record)
    }

    /// Decision reduced to what may be shown to the requester
    pub fn enforce(&self, requester: &UserId, operation: Operation, record: &Record) -> Enforcement {
        match self.check(requester, operation, record) {
            Ok(decision) => Enforcement::from_decision(operation, decision),
            Err(e) => {
                tracing::warn!(requester = %requester, operation = %operation, error = %e, "Check failed");
                Enforcement::from_error(&e)
            }
        }
    }

    /// [`enforce`](Self::enforce) on a request target; an unknown id renders
    /// exactly like a denied read
    pub fn enforce_target(&self, requester: &UserId, operation: Operation, target: Target) -> Enforcement {
        match self.resolve(operation, target) {
            Ok(Some(record)) => self.enforce(requester, operation, &record),
            Ok(None) => Enforcement::not_found(),
            Err(e) => {
                tracing::warn!(requester = %requester, operation = %operation, error = %e, "Target rejected");
                Enforcement::from_error(&e)
            }
        }
    }

    /// Record a request targets; `None` for an unknown id
    pub fn resolve(&self, operation: Operation, target: Target) -> Result<Option<Record>> {
        match target {
            Target::Stored(id) => self.record(&id),
            Target::Inline(record) if operation == Operation::Create => Ok(Some(record)),
            Target::Inline(_) => Err(AuthzError::InlineTarget { operation }),
        }
    }

    /// Stored record by id
    pub fn record(&self, id: &RecordId) -> Result<Option<Record>> {
        validate_identifier(id.as_str(), "record id")?;
        Ok(self.store.record(id)?)
    }

    pub fn list(&self, requester: &UserId, collection: Collection, organization: &OrgId) -> Result<Listing> {
        validate_identifier(requester.as_str(), "requester")?;
        validate_identifier(organization.as_str(), "organization")?;
        self.evaluator.list(requester, collection, organization)
    }

    /// UI projection; an unknown organization yields no standing
    pub fn visibility(
        &self,
        requester: &UserId,
        organization: &OrgId,
        facts: &ViewerFacts,
    ) -> Result<Visibility> {
        validate_identifier(requester.as_str(), "requester")?;
        let (role, is_org_owner) = match self.store.organization(organization)? {
            Some(org) => (
                self.evaluator.resolver().resolve_role(requester, &org)?,
                &org.owner == requester,
            ),
            None => (None, false),
        };
        // ownership comes from the store, never from the caller
        let facts = ViewerFacts {
            is_org_owner,
            ..*facts
        };
        Ok(Visibility {
            role,
            elements: self.projector.project_all(role, &facts),
        })
    }

    #[must_use]
    pub fn health(&self) -> Health {
        let stats = self.store.stats();
        #[cfg(feature = "metrics")]
        crate::observability::set_store_stats(&stats);

        match self.store.health_check() {
            Ok(()) => Health {
                status: STATUS_OK,
                version: env!("CARGO_PKG_VERSION"),
                stats,
                error: None,
            },
            Err(e) => Health {
                status: STATUS_DEGRADED,
                version: env!("CARGO_PKG_VERSION"),
                stats,
                error: Some(e.to_string()),
            },
        }
    }
}
