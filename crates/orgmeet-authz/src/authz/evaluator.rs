//! Rule evaluation

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::error::{DenialReason, Result};
use super::filter::RowFilter;
use super::membership::MembershipResolver;
use super::policy::PolicySet;
use super::role::Role;
use super::rule::RecordFacts;
use crate::audit::{DenialEvent, DenialSink, TracingSink};
use crate::constants::MAX_CHAIN_DEPTH;
use crate::features::FeatureSet;
use crate::store::AccessStore;
use crate::types::{Collection, OrgId, Operation, Organization, OwnerRef, Record, UserId};

/// Outcome of one authorization check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub allow: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
}

impl Decision {
    #[must_use]
    pub const fn allow() -> Self {
        Self {
            allow: true,
            reason: None,
        }
    }

    #[must_use]
    pub const fn deny(reason: DenialReason) -> Self {
        Self {
            allow: false,
            reason: Some(reason),
        }
    }

    #[must_use]
    pub const fn is_allowed(&self) -> bool {
        self.allow
    }
}

/// Owning organization and immediate parent of a record
#[derive(Debug, Clone)]
struct Lineage {
    organization: Organization,
    parent: Option<Record>,
}

/// Result of a filtered listing
#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub filter: RowFilter,
    pub records: Vec<Record>,
}

/// Authoritative decision function
///
/// Stateless between calls: every check re-reads the store, so two calls
/// over unchanged state return the same decision.
#[derive(Clone)]
pub struct Evaluator {
    store: Arc<dyn AccessStore>,
    resolver: MembershipResolver,
    policy: Arc<PolicySet>,
    features: Arc<FeatureSet>,
    sink: Arc<dyn DenialSink>,
}

impl fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Evaluator")
            .field("features", &self.features)
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    /// Standard policy, every module enabled, denials logged via tracing
    #[must_use]
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self {
            resolver: MembershipResolver::new(Arc::clone(&store)),
            store,
            policy: Arc::new(PolicySet::standard()),
            features: Arc::new(FeatureSet::all()),
            sink: Arc::new(TracingSink),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<PolicySet>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_features(mut self, features: Arc<FeatureSet>) -> Self {
        self.features = features;
        self
    }

    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn DenialSink>) -> Self {
        self.sink = sink;
        self
    }

    #[must_use]
    pub const fn resolver(&self) -> &MembershipResolver {
        &self.resolver
    }

    #[must_use]
    pub fn policy(&self) -> &PolicySet {
        &self.policy
    }

    #[must_use]
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Decide whether `requester` may perform `operation` on `record`
    ///
    /// `Err` only for infrastructure failures; every other outcome is a
    /// [`Decision`]. Denials are reported to the configured sink.
    #[tracing::instrument(
        level = "debug",
        skip(self, record),
        fields(collection = %record.collection, record = %record.id, allow = tracing::field::Empty)
    )]
    pub fn authorize(
        &self,
        requester: &UserId,
        operation: Operation,
        record: &Record,
    ) -> Result<Decision> {
        #[cfg(feature = "metrics")]
        let started = std::time::Instant::now();

        let result = self.decide(requester, operation, record);

        match &result {
            Ok(decision) => {
                tracing::Span::current().record("allow", decision.allow);
                if let Some(reason) = &decision.reason {
                    self.sink.record(&DenialEvent::new(
                        requester,
                        operation,
                        record,
                        reason.clone(),
                    ));
                }
                #[cfg(feature = "metrics")]
                crate::observability::record_decision(
                    record.collection,
                    operation,
                    decision.reason.as_ref().map_or("allow", DenialReason::code),
                    started.elapsed(),
                );
            }
            Err(e) => {
                tracing::error!(
                    requester = %requester,
                    operation = %operation,
                    error = %e,
                    "Authorization could not be decided"
                );
                #[cfg(feature = "metrics")]
                crate::observability::record_decision_error(record.collection, operation);
            }
        }

        result
    }

    fn decide(&self, requester: &UserId, operation: Operation, record: &Record) -> Result<Decision> {
        let module = record.collection.module();
        if !self.features.is_enabled(module) {
            return Ok(Decision::deny(DenialReason::ModuleDisabled { module }));
        }

        let rule = self.policy.rule(record.collection, operation);
        if rule.is_open() {
            return Ok(Decision::allow());
        }

        let Some(lineage) = self.lineage(record)? else {
            return Ok(Decision::deny(DenialReason::UnresolvableOwner {
                record: record.id.clone(),
            }));
        };

        let role = self
            .resolver
            .resolve_role(requester, &lineage.organization)?;
        if role.is_none() && rule.requires_membership {
            return Ok(Decision::deny(DenialReason::NotAMember));
        }

        let facts = RecordFacts::new(record, lineage.parent.as_ref());
        if rule.matches(requester, role, &lineage.organization, &facts) {
            Ok(Decision::allow())
        } else {
            Ok(Decision::deny(DenialReason::InsufficientPermission {
                operation,
                required: rule.describe(),
            }))
        }
    }

    /// Follow owner references up to the organization
    ///
    /// `None` for a dangling reference, a cycle or a chain deeper than
    /// [`MAX_CHAIN_DEPTH`].
    fn lineage(&self, record: &Record) -> Result<Option<Lineage>> {
        let mut owner = record.owner.clone();
        let mut parent: Option<Record> = None;
        let mut seen = HashSet::from([record.id.clone()]);

        for _ in 0..MAX_CHAIN_DEPTH {
            match owner {
                OwnerRef::Organization(org_id) => {
                    let organization = self.store.organization(&org_id)?;
                    if organization.is_none() {
                        tracing::debug!(record = %record.id, org = %org_id, "Owning organization missing");
                    }
                    return Ok(organization.map(|organization| Lineage {
                        organization,
                        parent,
                    }));
                }
                OwnerRef::Parent(parent_id) => {
                    if !seen.insert(parent_id.clone()) {
                        tracing::debug!(record = %record.id, parent = %parent_id, "Ownership cycle");
                        return Ok(None);
                    }
                    let Some(next) = self.store.record(&parent_id)? else {
                        tracing::debug!(record = %record.id, parent = %parent_id, "Parent record missing");
                        return Ok(None);
                    };
                    owner = next.owner.clone();
                    if parent.is_none() {
                        parent = Some(next);
                    }
                }
            }
        }

        tracing::debug!(record = %record.id, "Ownership chain too deep");
        Ok(None)
    }

    /// Requester's standing in an organization, if the organization exists
    fn standing(
        &self,
        requester: &UserId,
        organization: &OrgId,
    ) -> Result<Option<(Organization, Option<Role>)>> {
        let Some(organization) = self.store.organization(organization)? else {
            return Ok(None);
        };
        let role = self.resolver.resolve_role(requester, &organization)?;
        Ok(Some((organization, role)))
    }

    /// Compile the `view` rule for `collection` into a per-requester filter
    ///
    /// The filter admits exactly the records `authorize(view)` would allow.
    pub fn compile_filter(
        &self,
        requester: &UserId,
        collection: Collection,
        organization: &OrgId,
    ) -> Result<RowFilter> {
        if !self.features.is_enabled(collection.module()) {
            return Ok(RowFilter::Never);
        }

        let rule = self.policy.rule(collection, Operation::View);
        if rule.is_open() {
            return Ok(RowFilter::Always);
        }

        let Some((organization, role)) = self.standing(requester, organization)? else {
            return Ok(RowFilter::Never);
        };
        if role.is_none() && rule.requires_membership {
            return Ok(RowFilter::Never);
        }

        let filter = RowFilter::compile(rule, requester, role, &organization);
        tracing::debug!(
            requester = %requester,
            collection = %collection,
            filter = %filter,
            "Row filter compiled"
        );
        Ok(filter)
    }

    /// Records of `collection` in `organization` the requester may view
    pub fn list(
        &self,
        requester: &UserId,
        collection: Collection,
        organization: &OrgId,
    ) -> Result<Listing> {
        let filter = self.compile_filter(requester, collection, organization)?;
        if filter.is_never() {
            return Ok(Listing {
                filter,
                records: Vec::new(),
            });
        }

        let candidates = self.store.records_in(collection, organization)?;
        let mut records = Vec::with_capacity(candidates.len());
        for record in candidates {
            let parent = match (filter.needs_parent(), record.parent()) {
                (true, Some(parent_id)) => self.store.record(parent_id)?,
                _ => None,
            };
            if filter.matches(&RecordFacts::new(&record, parent.as_ref())) {
                records.push(record);
            }
        }

        tracing::debug!(
            requester = %requester,
            collection = %collection,
            org = %organization,
            count = records.len(),
            "Listing filtered"
        );
        Ok(Listing { filter, records })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::MemorySink;
    use crate::authz::AuthzError;
    use crate::features::{Module, Stage};
    use crate::store::InMemoryStore;
    use crate::testing::{DownStore, org1_store, record};
    use crate::types::RecordId;

    fn evaluator(store: &InMemoryStore) -> Evaluator {
        Evaluator::new(Arc::new(store.clone()))
    }

    fn org1_record(store: &InMemoryStore) -> Record {
        let org = store.organization(&OrgId::new("org1")).unwrap().unwrap();
        Record::organization(&org)
    }

    fn check(eval: &Evaluator, user: &str, op: Operation, record: &Record) -> Decision {
        eval.authorize(&user.into(), op, record).unwrap()
    }

    #[test]
    fn test_member_cannot_delete_organization() {
        let store = org1_store();
        let eval = evaluator(&store);
        let org = org1_record(&store);

        let decision = check(&eval, "userB", Operation::Delete, &org);
        assert!(!decision.allow);
        assert!(matches!(
            decision.reason,
            Some(DenialReason::InsufficientPermission {
                operation: Operation::Delete,
                ..
            })
        ));
        assert!(check(&eval, "userA", Operation::Delete, &org).allow);
    }

    #[test]
    fn test_admin_can_delete_organization() {
        let store = org1_store();
        let eval = evaluator(&store);
        assert!(check(&eval, "userD", Operation::Delete, &org1_record(&store)).allow);
    }

    #[test]
    fn test_non_member_view_is_not_a_member() {
        let store = org1_store();
        let eval = evaluator(&store);
        let decision = check(&eval, "userC", Operation::View, &record(&store, "meeting1"));
        assert_eq!(decision, Decision::deny(DenialReason::NotAMember));
    }

    #[test]
    fn test_notification_visibility() {
        let store = org1_store();
        let eval = evaluator(&store);
        let notice = record(&store, "notice1");

        assert!(check(&eval, "userE", Operation::View, &notice).allow);
        assert!(matches!(
            check(&eval, "userF", Operation::View, &notice).reason,
            Some(DenialReason::InsufficientPermission { .. })
        ));
        // creator of notice1 and creator of its meeting
        assert!(check(&eval, "userB", Operation::View, &notice).allow);
        // notice3 was created by userF
        assert!(check(&eval, "userF", Operation::View, &record(&store, "notice3")).allow);
        // notice2 hangs off meeting2, created by userF
        assert!(check(&eval, "userF", Operation::View, &record(&store, "notice2")).allow);
    }

    #[test]
    fn test_owner_passes_without_membership() {
        let store = org1_store();
        let eval = evaluator(&store);
        for id in ["meeting1", "agenda1", "motion1", "minutes1", "notice1", "template1"] {
            let r = record(&store, id);
            assert!(check(&eval, "userA", Operation::Update, &r).allow || id == "notice1", "{id}");
            assert!(check(&eval, "userA", Operation::Delete, &r).allow, "{id}");
        }
    }

    #[test]
    fn test_soft_deleted_membership_grants_nothing() {
        let store = org1_store();
        let eval = evaluator(&store);
        assert!(store.deactivate_membership(&"userD".into(), &"org1".into()));

        let decision = check(&eval, "userD", Operation::Delete, &org1_record(&store));
        assert_eq!(decision, Decision::deny(DenialReason::NotAMember));
    }

    #[test]
    fn test_organization_create_is_open() {
        let store = org1_store();
        let eval = evaluator(&store);
        let new_org = Record::in_organization(
            "org9",
            Collection::Organizations,
            OrgId::new("org9"),
            Some("userC".into()),
        );
        assert!(check(&eval, "userC", Operation::Create, &new_org).allow);
    }

    #[test]
    fn test_create_requires_member_role() {
        let store = org1_store();
        let eval = evaluator(&store);
        let draft = Record::in_organization(
            "meeting-new",
            Collection::Meetings,
            OrgId::new("org1"),
            Some("userG".into()),
        );
        assert!(!check(&eval, "userG", Operation::Create, &draft).allow);
        assert!(check(&eval, "userE", Operation::Create, &draft).allow);
        assert_eq!(
            check(&eval, "userC", Operation::Create, &draft),
            Decision::deny(DenialReason::NotAMember)
        );
    }

    #[test]
    fn test_parent_creator_edits_agenda() {
        let store = org1_store();
        let eval = evaluator(&store);
        let agenda = record(&store, "agenda1");
        // agenda1 by userE on meeting1 by userB
        assert!(check(&eval, "userE", Operation::Update, &agenda).allow);
        assert!(check(&eval, "userB", Operation::Update, &agenda).allow);
        assert!(!check(&eval, "userF", Operation::Update, &agenda).allow);
    }

    #[test]
    fn test_vote_update_is_creator_only() {
        let store = org1_store();
        let eval = evaluator(&store);
        let vote = record(&store, "vote1");
        assert!(check(&eval, "userF", Operation::Update, &vote).allow);
        assert!(!check(&eval, "userA", Operation::Update, &vote).allow);
        assert!(!check(&eval, "userD", Operation::Update, &vote).allow);
        assert!(check(&eval, "userD", Operation::Delete, &vote).allow);
    }

    #[test]
    fn test_dangling_parent_is_unresolvable() {
        let store = org1_store();
        let eval = evaluator(&store);
        let orphan = Record::under_parent(
            "orphan",
            Collection::Minutes,
            RecordId::new("meeting-gone"),
            Some("userB".into()),
        );
        let decision = check(&eval, "userB", Operation::Update, &orphan);
        assert_eq!(
            decision.reason,
            Some(DenialReason::UnresolvableOwner {
                record: RecordId::new("orphan")
            })
        );
    }

    #[test]
    fn test_self_reference_is_unresolvable() {
        let store = org1_store();
        let eval = evaluator(&store);
        let looped = Record::under_parent(
            "loop",
            Collection::Votes,
            RecordId::new("loop"),
            Some("userB".into()),
        );
        assert!(matches!(
            check(&eval, "userB", Operation::View, &looped).reason,
            Some(DenialReason::UnresolvableOwner { .. })
        ));
    }

    #[test]
    fn test_missing_organization_is_unresolvable() {
        let store = org1_store();
        let eval = evaluator(&store);
        let stray = Record::in_organization(
            "stray",
            Collection::Templates,
            OrgId::new("org-gone"),
            Some("userB".into()),
        );
        assert!(matches!(
            check(&eval, "userB", Operation::View, &stray).reason,
            Some(DenialReason::UnresolvableOwner { .. })
        ));
    }

    #[test]
    fn test_disabled_module_denies() {
        let store = org1_store();
        let features = FeatureSet::for_stage(Stage::new(2).unwrap());
        let eval = evaluator(&store).with_features(Arc::new(features));

        assert_eq!(
            check(&eval, "userA", Operation::View, &record(&store, "motion1")),
            Decision::deny(DenialReason::ModuleDisabled {
                module: Module::Voting
            })
        );
        assert!(check(&eval, "userA", Operation::View, &record(&store, "meeting1")).allow);
    }

    #[test]
    fn test_store_failure_is_an_error() {
        let eval = Evaluator::new(Arc::new(DownStore));
        let meeting = Record::in_organization(
            "meeting1",
            Collection::Meetings,
            OrgId::new("org1"),
            Some("userB".into()),
        );
        let err = eval
            .authorize(&"userB".into(), Operation::View, &meeting)
            .unwrap_err();
        assert!(matches!(err, AuthzError::ResolutionFailed(_)));
    }

    #[test]
    fn test_denials_reach_sink() {
        let store = org1_store();
        let sink = Arc::new(MemorySink::new());
        let eval = evaluator(&store).with_sink(sink.clone());

        check(&eval, "userC", Operation::View, &record(&store, "meeting1"));
        check(&eval, "userB", Operation::View, &record(&store, "meeting1"));
        check(&eval, "userB", Operation::Delete, &org1_record(&store));

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].requester, UserId::new("userC"));
        assert_eq!(events[0].reason, DenialReason::NotAMember);
        assert_eq!(events[1].collection, Collection::Organizations);
        assert_eq!(events[1].operation, Operation::Delete);
    }

    #[test]
    fn test_idempotent() {
        let store = org1_store();
        let eval = evaluator(&store);
        let notice = record(&store, "notice1");
        for user in ["userA", "userB", "userC", "userF"] {
            let first = check(&eval, user, Operation::View, &notice);
            let second = check(&eval, user, Operation::View, &notice);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_compile_filter() {
        let store = org1_store();
        let eval = evaluator(&store);
        let org1 = OrgId::new("org1");

        assert_eq!(
            eval.compile_filter(&"userG".into(), Collection::Meetings, &org1)
                .unwrap(),
            RowFilter::Always
        );
        assert_eq!(
            eval.compile_filter(&"userC".into(), Collection::Meetings, &org1)
                .unwrap(),
            RowFilter::Never
        );
        assert_eq!(
            eval.compile_filter(&"userB".into(), Collection::Meetings, &OrgId::new("nope"))
                .unwrap(),
            RowFilter::Never
        );
        let notices = eval
            .compile_filter(&"userE".into(), Collection::Notifications, &org1)
            .unwrap();
        assert!(notices.to_expression().contains(r#"recipient_user = "userE""#));
    }

    #[test]
    fn test_list_matches_view() {
        let store = org1_store();
        let eval = evaluator(&store);
        let org1 = OrgId::new("org1");

        for user in ["userA", "userB", "userC", "userD", "userE", "userF", "userG"] {
            for collection in Collection::ALL {
                let listing = eval.list(&user.into(), collection, &org1).unwrap();
                let listed: HashSet<_> = listing.records.iter().map(|r| r.id.clone()).collect();
                for candidate in store.records_in(collection, &org1).unwrap() {
                    let allowed = check(&eval, user, Operation::View, &candidate).allow;
                    assert_eq!(
                        listed.contains(&candidate.id),
                        allowed,
                        "{user} {collection} {}",
                        candidate.id
                    );
                }
            }
        }
    }

    #[test]
    fn test_list_organizations_and_memberships() {
        let store = org1_store();
        let eval = evaluator(&store);
        let org1 = OrgId::new("org1");
        let org_record = org1_record(&store);

        for user in ["userA", "userB", "userC", "userG"] {
            let listing = eval.list(&user.into(), Collection::Organizations, &org1).unwrap();
            let allowed = check(&eval, user, Operation::View, &org_record).allow;
            assert_eq!(listing.records == vec![org_record.clone()], allowed, "{user}");
        }

        let members = eval
            .list(&"userG".into(), Collection::Memberships, &org1)
            .unwrap();
        let mut ids: Vec<_> = members.records.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(
            ids,
            vec![
                "membership-org1-userB",
                "membership-org1-userD",
                "membership-org1-userE",
                "membership-org1-userF",
                "membership-org1-userG",
            ]
        );
        assert!(
            eval.list(&"userC".into(), Collection::Memberships, &org1)
                .unwrap()
                .records
                .is_empty()
        );
    }

    #[test]
    fn test_list_notifications() {
        let store = org1_store();
        let eval = evaluator(&store);
        let listing = eval
            .list(&"userE".into(), Collection::Notifications, &OrgId::new("org1"))
            .unwrap();
        let mut ids: Vec<_> = listing.records.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec!["notice1", "notice2"]);
    }
}
