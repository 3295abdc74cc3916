//! Shared unit-test fixtures

use crate::store::{
    AccessStore, InMemoryStore, Snapshot, StoreError, StoreResult, StoreStats,
};
use crate::types::{Collection, Membership, OrgId, Organization, Record, RecordId, UserId};

pub const ORG1_FIXTURE: &str = include_str!("../tests/fixtures/org1.json");

/// `org1` owned by `userA`; see the fixture file for the full cast
pub fn org1_store() -> InMemoryStore {
    let snapshot = Snapshot::from_json(ORG1_FIXTURE).unwrap();
    InMemoryStore::from_snapshot(snapshot).unwrap()
}

pub fn record(store: &InMemoryStore, id: &str) -> Record {
    store.record(&RecordId::new(id)).unwrap().unwrap()
}

/// Store whose every lookup fails
#[derive(Debug)]
pub struct DownStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("connection refused".into()))
}

impl AccessStore for DownStore {
    fn organization(&self, _: &OrgId) -> StoreResult<Option<Organization>> {
        down()
    }

    fn record(&self, _: &RecordId) -> StoreResult<Option<Record>> {
        down()
    }

    fn active_membership(&self, _: &UserId, _: &OrgId) -> StoreResult<Option<Membership>> {
        down()
    }

    fn records_in(&self, _: Collection, _: &OrgId) -> StoreResult<Vec<Record>> {
        down()
    }

    fn health_check(&self) -> StoreResult<()> {
        down()
    }

    fn stats(&self) -> StoreStats {
        StoreStats::default()
    }
}
