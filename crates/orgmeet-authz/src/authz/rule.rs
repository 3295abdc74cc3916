//! Rule predicates
//!
//! A [`Rule`] is a disjunction of [`Clause`]s: access is denied unless at least
//! one clause matches. There is no conjunction; every rule in the OrgMeet
//! schema is owner-or-admin, creator-or-org-owner, recipient-or-creator and so
//! on.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::role::{Role, has_min_role};
use crate::types::{Organization, Record, UserId};

/// Single access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clause {
    /// Any authenticated requester, no organization standing needed
    Authenticated,
    /// `requester == record.created_by`
    Creator,
    /// `requester == organization.owner`
    OrgOwner,
    /// Requester's role ranks at or above `role`
    MinRole { role: Role },
    /// `requester == record.recipient`
    Recipient,
    /// `requester == parent.created_by`
    ParentCreator,
}

impl Clause {
    #[must_use]
    pub const fn min_role(role: Role) -> Self {
        Self::MinRole { role }
    }

    /// Evaluate against resolved request state
    #[must_use]
    pub fn matches(
        &self,
        requester: &UserId,
        role: Option<Role>,
        organization: &Organization,
        facts: &RecordFacts<'_>,
    ) -> bool {
        match self {
            Self::Authenticated => true,
            Self::Creator => facts.created_by == Some(requester),
            Self::OrgOwner => &organization.owner == requester,
            Self::MinRole { role: required } => role.is_some_and(|r| has_min_role(r, *required)),
            Self::Recipient => facts.recipient == Some(requester),
            Self::ParentCreator => facts.parent_created_by == Some(requester),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated => f.write_str("authenticated"),
            Self::Creator => f.write_str("creator"),
            Self::OrgOwner => f.write_str("org-owner"),
            Self::MinRole { role } => write!(f, "{role}"),
            Self::Recipient => f.write_str("recipient"),
            Self::ParentCreator => f.write_str("parent-creator"),
        }
    }
}

/// Record-level facts a clause may inspect
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordFacts<'a> {
    pub created_by: Option<&'a UserId>,
    pub recipient: Option<&'a UserId>,
    pub parent_created_by: Option<&'a UserId>,
}

impl<'a> RecordFacts<'a> {
    #[must_use]
    pub fn new(record: &'a Record, parent: Option<&'a Record>) -> Self {
        Self {
            created_by: record.created_by.as_ref(),
            recipient: record.recipient.as_ref(),
            parent_created_by: parent.and_then(|p| p.created_by.as_ref()),
        }
    }
}

fn default_requires_membership() -> bool {
    true
}

/// Disjunction of clauses guarding one (collection, operation) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub clauses: Vec<Clause>,
    /// Deny with `NotAMember` before evaluating clauses when the requester
    /// has no standing in the organization
    #[serde(default = "default_requires_membership")]
    pub requires_membership: bool,
}

impl Rule {
    /// Members-only rule over `clauses`
    #[must_use]
    pub const fn any_of(clauses: Vec<Clause>) -> Self {
        Self {
            clauses,
            requires_membership: true,
        }
    }

    /// Rule admitting any authenticated requester
    #[must_use]
    pub fn open() -> Self {
        Self {
            clauses: vec![Clause::Authenticated],
            requires_membership: false,
        }
    }

    /// Rule that never matches
    #[must_use]
    pub const fn deny_all() -> Self {
        Self::any_of(Vec::new())
    }

    /// Open rules need no organization context at all
    #[must_use]
    pub fn is_open(&self) -> bool {
        !self.requires_membership && self.clauses.contains(&Clause::Authenticated)
    }

    #[must_use]
    pub fn matches(
        &self,
        requester: &UserId,
        role: Option<Role>,
        organization: &Organization,
        facts: &RecordFacts<'_>,
    ) -> bool {
        self.clauses
            .iter()
            .any(|clause| clause.matches(requester, role, organization, facts))
    }

    /// Human-readable clause list, e.g. `creator or org-owner or admin`
    #[must_use]
    pub fn describe(&self) -> String {
        if self.clauses.is_empty() {
            return "nobody".to_string();
        }
        self.clauses
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Collection, OrgId, RecordId};

    fn org() -> Organization {
        Organization {
            id: OrgId::new("org1"),
            name: "Board".to_string(),
            owner: UserId::new("owner"),
            description: String::new(),
        }
    }

    #[test]
    fn test_creator_clause() {
        let record =
            Record::in_organization("m1", Collection::Meetings, OrgId::new("org1"), Some("u1".into()));
        let facts = RecordFacts::new(&record, None);
        assert!(Clause::Creator.matches(&"u1".into(), None, &org(), &facts));
        assert!(!Clause::Creator.matches(&"u2".into(), Some(Role::Owner), &org(), &facts));
    }

    #[test]
    fn test_creator_clause_without_creator() {
        let record = Record::in_organization("m1", Collection::Meetings, OrgId::new("org1"), None);
        let facts = RecordFacts::new(&record, None);
        assert!(!Clause::Creator.matches(&"u1".into(), None, &org(), &facts));
    }

    #[test]
    fn test_org_owner_clause() {
        let facts = RecordFacts::default();
        assert!(Clause::OrgOwner.matches(&"owner".into(), None, &org(), &facts));
        assert!(!Clause::OrgOwner.matches(&"admin".into(), Some(Role::Admin), &org(), &facts));
    }

    #[test]
    fn test_min_role_clause() {
        let facts = RecordFacts::default();
        let clause = Clause::min_role(Role::Member);
        let u = UserId::new("u");
        assert!(clause.matches(&u, Some(Role::Member), &org(), &facts));
        assert!(clause.matches(&u, Some(Role::Owner), &org(), &facts));
        assert!(!clause.matches(&u, Some(Role::Viewer), &org(), &facts));
        assert!(!clause.matches(&u, None, &org(), &facts));
    }

    #[test]
    fn test_recipient_and_parent_creator_clauses() {
        let meeting =
            Record::in_organization("m1", Collection::Meetings, OrgId::new("org1"), Some("host".into()));
        let notification = Record::under_parent(
            "n1",
            Collection::Notifications,
            RecordId::new("m1"),
            Some("sender".into()),
        )
        .with_recipient("reader".into());
        let facts = RecordFacts::new(&notification, Some(&meeting));

        assert!(Clause::Recipient.matches(&"reader".into(), None, &org(), &facts));
        assert!(!Clause::Recipient.matches(&"sender".into(), None, &org(), &facts));
        assert!(Clause::ParentCreator.matches(&"host".into(), None, &org(), &facts));
        assert!(!Clause::ParentCreator.matches(&"reader".into(), None, &org(), &facts));
    }

    #[test]
    fn test_rule_is_disjunction() {
        let rule = Rule::any_of(vec![Clause::OrgOwner, Clause::min_role(Role::Admin)]);
        let facts = RecordFacts::default();
        assert!(rule.matches(&"owner".into(), None, &org(), &facts));
        assert!(rule.matches(&"a".into(), Some(Role::Admin), &org(), &facts));
        assert!(!rule.matches(&"m".into(), Some(Role::Member), &org(), &facts));
    }

    #[test]
    fn test_deny_all_and_open() {
        let facts = RecordFacts::default();
        assert!(!Rule::deny_all().matches(&"owner".into(), Some(Role::Owner), &org(), &facts));
        assert!(Rule::open().is_open());
        assert!(!Rule::any_of(vec![Clause::Authenticated]).is_open());
        assert!(!Rule::any_of(vec![Clause::Creator]).is_open());
    }

    #[test]
    fn test_describe() {
        let rule = Rule::any_of(vec![
            Clause::Creator,
            Clause::OrgOwner,
            Clause::min_role(Role::Admin),
        ]);
        assert_eq!(rule.describe(), "creator or org-owner or admin");
        assert_eq!(Rule::deny_all().describe(), "nobody");
    }

    #[test]
    fn test_rule_deserialize() {
        let json = r#"{"clauses": [{"kind": "min_role", "role": "member"}, {"kind": "creator"}]}"#;
        let rule: Rule = serde_json::from_str(json).unwrap();
        assert!(rule.requires_membership);
        assert_eq!(
            rule.clauses,
            vec![Clause::min_role(Role::Member), Clause::Creator]
        );

        let bad = r#"{"clauses": [{"kind": "min_role", "role": "boss"}]}"#;
        assert!(serde_json::from_str::<Rule>(bad).is_err());
    }
}
