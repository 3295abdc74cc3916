//! Collection policy table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::role::Role;
use super::rule::{Clause, Rule};
use crate::Error;
use crate::types::{Collection, Operation};

static DENY_ALL: Rule = Rule::deny_all();

/// Rule replacement loaded from configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOverride {
    pub collection: Collection,
    pub operation: Operation,
    #[serde(flatten)]
    pub rule: Rule,
}

/// Immutable map from (collection, operation) to its rule
///
/// `list` has no entry of its own; lookups for it return the `view` rule so
/// a record appears in a listing exactly when it may be viewed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicySet {
    rules: HashMap<(Collection, Operation), Rule>,
}

impl PolicySet {
    /// The OrgMeet schema rules
    #[must_use]
    pub fn standard() -> Self {
        use Clause::{Creator, OrgOwner, ParentCreator, Recipient};
        use Collection::{
            AgendaItems, Meetings, Memberships, Minutes, Motions, Notifications, Organizations,
            Templates, Votes,
        };
        use Operation::{Create, Delete, Update, View};

        let viewer = || Rule::any_of(vec![Clause::min_role(Role::Viewer)]);
        let member = || Rule::any_of(vec![Clause::min_role(Role::Member)]);
        let admin = Clause::min_role(Role::Admin);

        let mut rules = HashMap::new();
        let mut set = |collection, operation, rule| {
            rules.insert((collection, operation), rule);
        };

        set(Organizations, View, viewer());
        set(Organizations, Create, Rule::open());
        set(Organizations, Update, Rule::any_of(vec![OrgOwner, admin.clone()]));
        set(Organizations, Delete, Rule::any_of(vec![OrgOwner, admin.clone()]));

        for op in [Create, Update, Delete] {
            set(Memberships, op, Rule::any_of(vec![OrgOwner, admin.clone()]));
        }
        set(Memberships, View, viewer());

        set(Meetings, View, viewer());
        set(Meetings, Create, member());
        set(Meetings, Update, Rule::any_of(vec![Creator, OrgOwner, admin.clone()]));
        set(Meetings, Delete, Rule::any_of(vec![Creator, OrgOwner, admin.clone()]));

        set(AgendaItems, View, viewer());
        set(AgendaItems, Create, member());
        set(AgendaItems, Update, Rule::any_of(vec![Creator, ParentCreator, admin.clone()]));
        set(AgendaItems, Delete, Rule::any_of(vec![Creator, ParentCreator, admin.clone()]));

        set(Motions, View, viewer());
        set(Motions, Create, member());
        set(Motions, Update, Rule::any_of(vec![Creator, admin.clone()]));
        set(Motions, Delete, Rule::any_of(vec![Creator, OrgOwner, admin.clone()]));

        set(Votes, View, viewer());
        set(Votes, Create, member());
        set(Votes, Update, Rule::any_of(vec![Creator]));
        set(Votes, Delete, Rule::any_of(vec![Creator, admin.clone()]));

        set(Minutes, View, viewer());
        set(Minutes, Create, member());
        set(Minutes, Update, Rule::any_of(vec![Creator, OrgOwner]));
        set(Minutes, Delete, Rule::any_of(vec![Creator, OrgOwner]));

        set(Notifications, View, Rule::any_of(vec![Recipient, Creator, ParentCreator]));
        set(Notifications, Create, member());
        set(Notifications, Update, Rule::any_of(vec![Recipient, Creator]));
        set(Notifications, Delete, Rule::any_of(vec![Recipient, Creator, OrgOwner]));

        set(Templates, View, viewer());
        set(Templates, Create, member());
        set(Templates, Update, Rule::any_of(vec![Creator, OrgOwner, admin.clone()]));
        set(Templates, Delete, Rule::any_of(vec![Creator, OrgOwner, admin]));

        Self { rules }
    }

    /// Standard rules with configured replacements applied in order
    pub fn with_overrides(overrides: &[RuleOverride]) -> Result<Self, Error> {
        let mut policy = Self::standard();
        for entry in overrides {
            policy.replace(entry)?;
        }
        Ok(policy)
    }

    fn replace(&mut self, entry: &RuleOverride) -> Result<(), Error> {
        if entry.operation == Operation::List {
            return Err(Error::Config(format!(
                "{}: list is governed by the view rule; override view instead",
                entry.collection
            )));
        }
        if entry.rule.clauses.is_empty() {
            return Err(Error::Config(format!(
                "{}.{}: a rule needs at least one clause",
                entry.collection, entry.operation
            )));
        }
        if entry.rule.requires_membership && entry.rule.clauses.contains(&Clause::Authenticated) {
            return Err(Error::Config(format!(
                "{}.{}: the authenticated clause requires requires_membership = false",
                entry.collection, entry.operation
            )));
        }

        tracing::info!(
            collection = %entry.collection,
            operation = %entry.operation,
            rule = %entry.rule,
            "Policy rule overridden"
        );
        self.rules
            .insert((entry.collection, entry.operation), entry.rule.clone());
        Ok(())
    }

    /// Rule for `(collection, operation)`; `list` resolves to `view`
    #[must_use]
    pub fn rule(&self, collection: Collection, operation: Operation) -> &Rule {
        self.rules
            .get(&(collection, operation.rule_key()))
            .unwrap_or(&DENY_ALL)
    }
}

impl Default for PolicySet {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_covers_every_pair() {
        let policy = PolicySet::standard();
        for collection in Collection::ALL {
            for operation in Operation::ALL {
                let rule = policy.rule(collection, operation);
                assert!(
                    !rule.clauses.is_empty(),
                    "{collection}.{operation} has no rule"
                );
            }
        }
    }

    #[test]
    fn test_list_shares_view_rule() {
        let policy = PolicySet::standard();
        for collection in Collection::ALL {
            assert_eq!(
                policy.rule(collection, Operation::List),
                policy.rule(collection, Operation::View)
            );
        }
    }

    #[test]
    fn test_only_organization_create_is_open() {
        let policy = PolicySet::standard();
        for collection in Collection::ALL {
            for operation in Operation::ALL {
                let open = policy.rule(collection, operation).is_open();
                let expected =
                    collection == Collection::Organizations && operation == Operation::Create;
                assert_eq!(open, expected, "{collection}.{operation}");
            }
        }
    }

    #[test]
    fn test_notification_view_rule() {
        let policy = PolicySet::standard();
        assert_eq!(
            policy
                .rule(Collection::Notifications, Operation::View)
                .describe(),
            "recipient or creator or parent-creator"
        );
    }

    #[test]
    fn test_override_replaces_rule() {
        let policy = PolicySet::with_overrides(&[RuleOverride {
            collection: Collection::Votes,
            operation: Operation::Update,
            rule: Rule::any_of(vec![Clause::Creator, Clause::min_role(Role::Admin)]),
        }])
        .unwrap();
        assert_eq!(
            policy.rule(Collection::Votes, Operation::Update).describe(),
            "creator or admin"
        );
        assert_eq!(
            policy.rule(Collection::Votes, Operation::Delete),
            PolicySet::standard().rule(Collection::Votes, Operation::Delete)
        );
    }

    #[test]
    fn test_override_rejects_empty_rule() {
        let result = PolicySet::with_overrides(&[RuleOverride {
            collection: Collection::Meetings,
            operation: Operation::Delete,
            rule: Rule::deny_all(),
        }]);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_override_rejects_list() {
        let result = PolicySet::with_overrides(&[RuleOverride {
            collection: Collection::Meetings,
            operation: Operation::List,
            rule: Rule::any_of(vec![Clause::Creator]),
        }]);
        assert!(result.unwrap_err().to_string().contains("view"));
    }

    #[test]
    fn test_override_rejects_member_only_authenticated() {
        let result = PolicySet::with_overrides(&[RuleOverride {
            collection: Collection::Templates,
            operation: Operation::View,
            rule: Rule::any_of(vec![Clause::Authenticated]),
        }]);
        assert!(result.is_err());
    }

    #[test]
    fn test_override_from_toml() {
        let entry: RuleOverride = toml::from_str(
            r#"
            collection = "motions"
            operation = "update"
            clauses = [{ kind = "creator" }, { kind = "org_owner" }]
            "#,
        )
        .unwrap();
        assert_eq!(entry.collection, Collection::Motions);
        assert!(entry.rule.requires_membership);
        assert_eq!(entry.rule.clauses, vec![Clause::Creator, Clause::OrgOwner]);
    }
}
