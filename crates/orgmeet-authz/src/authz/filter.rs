//! Row filters for list queries
//!
//! A [`RowFilter`] is a rule specialized to one requester in one
//! organization. Clauses that depend only on the requester (role thresholds,
//! organization ownership) fold to constants; what remains are equality
//! tests on record fields that the query layer can push down.

use std::fmt;

use serde::Serialize;

use super::role::{Role, has_min_role};
use super::rule::{Clause, RecordFacts, Rule};
use crate::constants::fields;
use crate::types::{Organization, UserId};

/// Record field a row filter can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowField {
    CreatedBy,
    Recipient,
    ParentCreatedBy,
}

impl RowField {
    /// Column name in the query layer
    #[must_use]
    pub const fn column(&self) -> &'static str {
        match self {
            Self::CreatedBy => fields::CREATED_BY,
            Self::Recipient => fields::RECIPIENT,
            Self::ParentCreatedBy => fields::PARENT_CREATED_BY,
        }
    }
}

/// `field = user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldMatch {
    pub field: RowField,
    pub user: UserId,
}

impl FieldMatch {
    fn matches(&self, facts: &RecordFacts<'_>) -> bool {
        let value = match self.field {
            RowField::CreatedBy => facts.created_by,
            RowField::Recipient => facts.recipient,
            RowField::ParentCreatedBy => facts.parent_created_by,
        };
        value == Some(&self.user)
    }
}

/// Compiled per-requester filter
///
/// Always in simplest form: `Any` is never empty and never contains a
/// duplicate test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "matches", rename_all = "snake_case")]
pub enum RowFilter {
    /// Every record passes
    Always,
    /// No record passes
    Never,
    /// A record passes if any field test holds
    Any(Vec<FieldMatch>),
}

impl RowFilter {
    /// Specialize `rule` for a requester whose standing is already known
    ///
    /// Membership gating is the caller's job; this only folds clauses.
    #[must_use]
    pub fn compile(
        rule: &Rule,
        requester: &UserId,
        role: Option<Role>,
        organization: &Organization,
    ) -> Self {
        let mut tests: Vec<FieldMatch> = Vec::new();
        for clause in &rule.clauses {
            let field = match clause {
                Clause::Authenticated => return Self::Always,
                Clause::OrgOwner if &organization.owner == requester => return Self::Always,
                Clause::MinRole { role: required }
                    if role.is_some_and(|r| has_min_role(r, *required)) =>
                {
                    return Self::Always;
                }
                Clause::OrgOwner | Clause::MinRole { .. } => continue,
                Clause::Creator => RowField::CreatedBy,
                Clause::Recipient => RowField::Recipient,
                Clause::ParentCreator => RowField::ParentCreatedBy,
            };
            if !tests.iter().any(|t| t.field == field) {
                tests.push(FieldMatch {
                    field,
                    user: requester.clone(),
                });
            }
        }

        if tests.is_empty() {
            Self::Never
        } else {
            Self::Any(tests)
        }
    }

    #[must_use]
    pub fn matches(&self, facts: &RecordFacts<'_>) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::Any(tests) => tests.iter().any(|t| t.matches(facts)),
        }
    }

    #[must_use]
    pub const fn is_never(&self) -> bool {
        matches!(self, Self::Never)
    }

    /// Whether evaluating this filter needs the parent record
    #[must_use]
    pub fn needs_parent(&self) -> bool {
        match self {
            Self::Any(tests) => tests.iter().any(|t| t.field == RowField::ParentCreatedBy),
            Self::Always | Self::Never => false,
        }
    }

    /// Render as a query-layer expression, e.g.
    /// `created_by = "userB" || recipient_user = "userB"`
    #[must_use]
    pub fn to_expression(&self) -> String {
        match self {
            Self::Always => "true".to_string(),
            Self::Never => "false".to_string(),
            Self::Any(tests) => tests
                .iter()
                .map(|t| format!("{} = \"{}\"", t.field.column(), escape(t.user.as_str())))
                .collect::<Vec<_>>()
                .join(" || "),
        }
    }
}

impl fmt::Display for RowFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_expression())
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
