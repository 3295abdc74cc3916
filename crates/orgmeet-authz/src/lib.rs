//! Role-based access control for OrgMeet
//!
//! Decides whether a user may list, view, create, update or delete a record
//! in a multi-tenant meeting platform, compiles equivalent row filters for
//! listings, and projects roles onto UI control visibility.

pub mod audit;
pub mod authz;
pub mod config;
mod constants;
mod error;
pub mod features;
pub mod observability;
pub mod service;
pub mod store;
pub mod transport;
pub mod types;
mod validation;
pub mod visibility;

#[cfg(test)]
mod testing;

pub use audit::{DenialEvent, DenialSink, MemorySink, ResponseKind, TracingSink};
pub use authz::{
    AuthzError, Clause, Decision, DenialReason, Evaluator, Listing, PolicySet, Role, RowFilter,
    Rule, RuleOverride,
};
pub use config::{Config, ConfigBuilder, TelemetryConfig, TransportConfig};
pub use constants::MAX_CHAIN_DEPTH;
pub use error::{Error, Result};
pub use features::{FeatureSet, Module, Stage};
pub use service::{AuthzService, Enforcement, Health, Target, Visibility};
pub use store::{AccessStore, InMemoryStore, Snapshot, StoreError, TracedStore};
pub use types::*;
pub use validation::{validate_identifier, validate_request};
pub use visibility::{Projector, UiElement, ViewerFacts};
