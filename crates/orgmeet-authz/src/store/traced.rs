//! Traced store wrapper for observability

use super::error::StoreResult;
use super::provider::{AccessStore, StoreStats};
use crate::types::{Collection, Membership, OrgId, Organization, Record, RecordId, UserId};

/// Wrapper that adds tracing to any `AccessStore`
///
/// Uses debug-level spans; lookup failures are logged at warn.
#[derive(Debug, Clone)]
pub struct TracedStore<S> {
    inner: S,
}

impl<S> TracedStore<S> {
    pub const fn new(store: S) -> Self {
        Self { inner: store }
    }

    pub const fn inner(&self) -> &S {
        &self.inner
    }
}

fn log_failure<T>(operation: &'static str, result: &StoreResult<T>) {
    if let Err(e) = result {
        tracing::warn!(store.operation = operation, error = %e, "Store lookup failed");
    }
}

impl<S: AccessStore> AccessStore for TracedStore<S> {
    fn organization(&self, id: &OrgId) -> StoreResult<Option<Organization>> {
        let _span = tracing::debug_span!("store.organization", store.org = %id).entered();
        let result = self.inner.organization(id);
        if let Ok(found) = &result {
            tracing::debug!(store.found = found.is_some());
        }
        log_failure("organization", &result);
        result
    }

    fn record(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        let _span = tracing::debug_span!("store.record", store.record = %id).entered();
        let result = self.inner.record(id);
        if let Ok(found) = &result {
            tracing::debug!(store.found = found.is_some());
        }
        log_failure("record", &result);
        result
    }

    fn active_membership(
        &self,
        user: &UserId,
        organization: &OrgId,
    ) -> StoreResult<Option<Membership>> {
        let _span = tracing::debug_span!(
            "store.active_membership",
            store.user = %user,
            store.org = %organization,
        )
        .entered();
        let result = self.inner.active_membership(user, organization);
        if let Ok(found) = &result {
            tracing::debug!(
                store.role = found.as_ref().map(|m| m.role.as_str()),
                "Membership lookup"
            );
        }
        log_failure("active_membership", &result);
        result
    }

    fn records_in(
        &self,
        collection: Collection,
        organization: &OrgId,
    ) -> StoreResult<Vec<Record>> {
        let _span = tracing::debug_span!(
            "store.records_in",
            store.collection = collection.as_str(),
            store.org = %organization,
        )
        .entered();
        let result = self.inner.records_in(collection, organization);
        if let Ok(records) = &result {
            tracing::debug!(store.count = records.len());
        }
        log_failure("records_in", &result);
        result
    }

    fn health_check(&self) -> StoreResult<()> {
        let result = self.inner.health_check();
        log_failure("health_check", &result);
        result
    }

    fn stats(&self) -> StoreStats {
        self.inner.stats()
    }
}
