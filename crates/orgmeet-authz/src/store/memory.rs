//! In-memory access store with relation and uniqueness checks

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;

use super::error::{StoreError, StoreResult};
use super::provider::{AccessStore, StoreStats};
use crate::authz::Role;
use crate::constants::MAX_CHAIN_DEPTH;
use crate::types::{
    Collection, Membership, OrgId, Organization, OwnerRef, Record, RecordId, User, UserId,
};

#[derive(Default)]
struct Inner {
    users: HashMap<UserId, User>,
    emails: HashSet<String>,
    organizations: HashMap<OrgId, Organization>,
    org_names: HashSet<String>,
    /// Full history; inactive rows are kept for audit
    memberships: Vec<Membership>,
    records: BTreeMap<RecordId, Record>,
}

impl Inner {
    /// Organization at the end of the ownership chain, if the chain is intact
    fn owning_org<'a>(&'a self, record: &'a Record) -> Option<&'a OrgId> {
        let mut owner = &record.owner;
        for _ in 0..MAX_CHAIN_DEPTH {
            match owner {
                OwnerRef::Organization(org) => {
                    return self.organizations.contains_key(org).then_some(org);
                }
                OwnerRef::Parent(parent) => owner = &self.records.get(parent)?.owner,
            }
        }
        None
    }

    fn descends_from(&self, record: &Record, ancestor: &RecordId) -> bool {
        let mut owner = &record.owner;
        for _ in 0..MAX_CHAIN_DEPTH {
            match owner {
                OwnerRef::Organization(_) => return false,
                OwnerRef::Parent(parent) if parent == ancestor => return true,
                OwnerRef::Parent(parent) => match self.records.get(parent) {
                    Some(next) => owner = &next.owner,
                    None => return false,
                },
            }
        }
        false
    }

    fn active_index(&self, user: &UserId, organization: &OrgId) -> Option<usize> {
        self.memberships
            .iter()
            .position(|m| m.is_active && &m.user == user && &m.organization == organization)
    }

    /// Record view of an organization or an active membership row
    fn derived_record(&self, id: &RecordId) -> Option<Record> {
        if let Some(org) = self.organizations.get(&OrgId::new(id.as_str())) {
            return Some(Record::organization(org));
        }
        self.memberships
            .iter()
            .filter(|m| m.is_active)
            .map(Record::membership)
            .find(|r| &r.id == id)
    }

    fn id_taken(&self, id: &RecordId) -> bool {
        self.records.contains_key(id) || self.derived_record(id).is_some()
    }
}

/// Thread-safe in-memory store
///
/// Enforces the constraints a production backend declares in its schema:
/// unique user emails, unique organization names, at most one active
/// membership per (user, organization), and relation integrity for record
/// owner references. Deletes cascade to dependent records.
///
/// User references (`owner`, `created_by`, `recipient`) are not validated;
/// identities may live in an external directory.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    inner: Arc<RwLock<Inner>>,
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("InMemoryStore")
            .field("organizations", &inner.organizations.len())
            .field("memberships", &inner.memberships.len())
            .field("records", &inner.records.len())
            .finish_non_exhaustive()
    }
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_user(&self, user: User) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let email = user.email.trim().to_lowercase();
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::DuplicateUser(user.id));
        }
        if inner.emails.contains(&email) {
            return Err(StoreError::DuplicateEmail(user.email));
        }
        inner.emails.insert(email);
        inner.users.insert(user.id.clone(), user);
        Ok(())
    }

    /// Insert an organization; it is also visible as a record of the
    /// `organizations` collection under its own id
    pub fn insert_organization(&self, organization: Organization) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let name = organization.name.trim().to_lowercase();
        if inner.org_names.contains(&name) || inner.organizations.contains_key(&organization.id) {
            return Err(StoreError::DuplicateOrganization(organization.name));
        }
        let record_id = RecordId::new(organization.id.as_str());
        if inner.id_taken(&record_id) {
            return Err(StoreError::DuplicateRecord(record_id));
        }
        inner.org_names.insert(name);
        inner
            .organizations
            .insert(organization.id.clone(), organization);
        Ok(())
    }

    /// Add a membership row; an active row must be unique per pair
    pub fn add_membership(&self, membership: Membership) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if !inner.organizations.contains_key(&membership.organization) {
            return Err(StoreError::UnknownOrganization(membership.organization));
        }
        if membership.is_active
            && inner
                .active_index(&membership.user, &membership.organization)
                .is_some()
        {
            return Err(StoreError::DuplicateMembership {
                user: membership.user,
                organization: membership.organization,
            });
        }
        if membership.is_active {
            let record_id = Record::membership(&membership).id;
            if inner.records.contains_key(&record_id) {
                return Err(StoreError::DuplicateRecord(record_id));
            }
        }
        inner.memberships.push(membership);
        Ok(())
    }

    /// Change the role of the active membership
    pub fn set_role(&self, user: &UserId, organization: &OrgId, role: Role) -> StoreResult<()> {
        let mut inner = self.inner.write();
        let index = inner.active_index(user, organization).ok_or_else(|| {
            StoreError::MembershipNotFound {
                user: user.clone(),
                organization: organization.clone(),
            }
        })?;
        inner.memberships[index].role = role;
        Ok(())
    }

    /// Soft-delete the active membership; returns whether one existed
    pub fn deactivate_membership(&self, user: &UserId, organization: &OrgId) -> bool {
        let mut inner = self.inner.write();
        match inner.active_index(user, organization) {
            Some(index) => {
                inner.memberships[index].is_active = false;
                true
            }
            None => false,
        }
    }

    /// All membership rows for a pair, oldest first
    #[must_use]
    pub fn membership_history(&self, user: &UserId, organization: &OrgId) -> Vec<Membership> {
        self.inner
            .read()
            .memberships
            .iter()
            .filter(|m| &m.user == user && &m.organization == organization)
            .cloned()
            .collect()
    }

    /// Insert a record; its owner reference must already exist
    ///
    /// Organization and membership records are derived from their rows and
    /// cannot be inserted directly.
    pub fn insert_record(&self, record: Record) -> StoreResult<()> {
        let mut inner = self.inner.write();
        if record.collection.is_derived() {
            return Err(StoreError::DerivedCollection {
                record: record.id,
                collection: record.collection,
            });
        }
        if inner.id_taken(&record.id) {
            return Err(StoreError::DuplicateRecord(record.id));
        }
        let target_exists = match &record.owner {
            OwnerRef::Organization(org) => inner.organizations.contains_key(org),
            OwnerRef::Parent(parent) => inner.records.contains_key(parent),
        };
        if !target_exists {
            let target = match &record.owner {
                OwnerRef::Organization(org) => format!("organization {org}"),
                OwnerRef::Parent(parent) => format!("record {parent}"),
            };
            return Err(StoreError::DanglingReference {
                record: record.id,
                target,
            });
        }
        inner.records.insert(record.id.clone(), record);
        Ok(())
    }

    /// Delete a record and everything beneath it; returns removed count
    pub fn delete_record(&self, id: &RecordId) -> usize {
        let mut inner = self.inner.write();
        if !inner.records.contains_key(id) {
            return 0;
        }
        let doomed: Vec<RecordId> = inner
            .records
            .values()
            .filter(|r| &r.id == id || inner.descends_from(r, id))
            .map(|r| r.id.clone())
            .collect();
        for record_id in &doomed {
            inner.records.remove(record_id);
        }
        tracing::debug!(record = %id, removed = doomed.len(), "Record deleted with dependents");
        doomed.len()
    }

    /// Delete an organization with all its records and deactivate its
    /// memberships; returns removed record count
    pub fn delete_organization(&self, id: &OrgId) -> usize {
        let mut inner = self.inner.write();
        let Some(org) = inner.organizations.get(id) else {
            return 0;
        };
        let name = org.name.trim().to_lowercase();

        let doomed: Vec<RecordId> = inner
            .records
            .values()
            .filter(|r| inner.owning_org(r) == Some(id))
            .map(|r| r.id.clone())
            .collect();
        for record_id in &doomed {
            inner.records.remove(record_id);
        }
        for membership in inner
            .memberships
            .iter_mut()
            .filter(|m| &m.organization == id)
        {
            membership.is_active = false;
        }
        inner.organizations.remove(id);
        inner.org_names.remove(&name);
        tracing::debug!(organization = %id, removed = doomed.len(), "Organization deleted");
        doomed.len()
    }
}

impl AccessStore for InMemoryStore {
    fn organization(&self, id: &OrgId) -> StoreResult<Option<Organization>> {
        Ok(self.inner.read().organizations.get(id).cloned())
    }

    fn record(&self, id: &RecordId) -> StoreResult<Option<Record>> {
        let inner = self.inner.read();
        Ok(inner
            .records
            .get(id)
            .cloned()
            .or_else(|| inner.derived_record(id)))
    }

    fn active_membership(
        &self,
        user: &UserId,
        organization: &OrgId,
    ) -> StoreResult<Option<Membership>> {
        let inner = self.inner.read();
        Ok(inner
            .active_index(user, organization)
            .map(|index| inner.memberships[index].clone()))
    }

    fn records_in(
        &self,
        collection: Collection,
        organization: &OrgId,
    ) -> StoreResult<Vec<Record>> {
        let inner = self.inner.read();
        let records = match collection {
            Collection::Organizations => inner
                .organizations
                .get(organization)
                .map(Record::organization)
                .into_iter()
                .collect(),
            Collection::Memberships => inner
                .memberships
                .iter()
                .filter(|m| m.is_active && &m.organization == organization)
                .map(Record::membership)
                .collect(),
            _ => inner
                .records
                .values()
                .filter(|r| r.collection == collection && inner.owning_org(r) == Some(organization))
                .cloned()
                .collect(),
        };
        Ok(records)
    }

    fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        StoreStats {
            users: inner.users.len() as u64,
            organizations: inner.organizations.len() as u64,
            memberships: inner.memberships.len() as u64,
            active_memberships: inner.memberships.iter().filter(|m| m.is_active).count() as u64,
            records: inner.records.len() as u64,
        }
    }
}
