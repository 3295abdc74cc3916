//! JSON snapshot loading for fixtures and the bundled decision service

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{StoreError, StoreResult};
use super::memory::InMemoryStore;
use super::provider::AccessStore;
use crate::types::{Membership, Organization, Record, User};

/// Serialized store contents
///
/// Records must be listed parents first; each owner reference is validated
/// on insert.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub organizations: Vec<Organization>,
    #[serde(default)]
    pub memberships: Vec<Membership>,
    #[serde(default)]
    pub records: Vec<Record>,
}

impl Snapshot {
    pub fn from_json(content: &str) -> StoreResult<Self> {
        serde_json::from_str(content)
            .map_err(|e| StoreError::Snapshot(format!("Failed to parse snapshot: {e}")))
    }

    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Snapshot(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_json(&content)
    }
}

impl InMemoryStore {
    /// Build a store from a snapshot, enforcing all store constraints
    pub fn from_snapshot(snapshot: Snapshot) -> StoreResult<Self> {
        let store = Self::new();
        for user in snapshot.users {
            store.insert_user(user)?;
        }
        for organization in snapshot.organizations {
            store.insert_organization(organization)?;
        }
        for membership in snapshot.memberships {
            store.add_membership(membership)?;
        }
        for record in snapshot.records {
            store.insert_record(record)?;
        }
        let stats = store.stats();
        tracing::info!(
            organizations = stats.organizations,
            memberships = stats.memberships,
            records = stats.records,
            "Snapshot loaded"
        );
        Ok(store)
    }
}
