//! Access store trait definition

use std::sync::Arc;

use serde::Serialize;

use super::error::StoreResult;
use crate::types::{Collection, Membership, OrgId, Organization, Record, RecordId, UserId};

/// Store statistics for health reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub users: u64,
    pub organizations: u64,
    pub memberships: u64,
    pub active_memberships: u64,
    pub records: u64,
}

/// Read side of the record store consumed by authorization
///
/// Every call is a single fallible lookup. Absence is `Ok(None)`; `Err` is
/// reserved for infrastructure failures. Timeouts and retries belong to the
/// implementor.
pub trait AccessStore: Send + Sync {
    /// Look up an organization by id
    fn organization(&self, id: &OrgId) -> StoreResult<Option<Organization>>;

    /// Look up a record by id
    fn record(&self, id: &RecordId) -> StoreResult<Option<Record>>;

    /// The unique active membership for (user, organization), if any
    fn active_membership(
        &self,
        user: &UserId,
        organization: &OrgId,
    ) -> StoreResult<Option<Membership>>;

    /// Records of `collection` whose ownership chain ends at `organization`
    fn records_in(&self, collection: Collection, organization: &OrgId)
    -> StoreResult<Vec<Record>>;

    /// Health check for the store backend
    fn health_check(&self) -> StoreResult<()>;

    /// Current store statistics
    fn stats(&self) -> StoreStats;
}

impl<S: AccessStore + ?Sized> AccessStore for Arc<S> {
    fn organization(&self, id: &OrgId) -> StoreResult<Option<Organization>> {
        (**self).organization(id)
    }

    fn record(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        (**self).record(id)
    }

    fn active_membership(
        &self,
        user: &UserId,
        organization: &OrgId,
    ) -> StoreResult<Option<Membership>> {
        (**self).active_membership(user, organization)
    }

    fn records_in(
        &self,
        collection: Collection,
        organization: &OrgId,
    ) -> StoreResult<Vec<Record>> {
        (**self).records_in(collection, organization)
    }

    fn health_check(&self) -> StoreResult<()> {
        (**self).health_check()
    }

    fn stats(&self) -> StoreStats {
        (**self).stats()
    }
}
