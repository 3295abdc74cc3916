//! Domain types shared by the resolver, evaluator and store

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::authz::{AuthzError, Role};
use crate::features::Module;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_owned())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Opaque user identifier
    UserId
);
string_id!(
    /// Organization identifier
    OrgId
);
string_id!(
    /// Record identifier, unique across collections
    RecordId
);

/// Registered user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    #[serde(default)]
    pub name: String,
}

/// Tenant boundary with a single structural owner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    pub owner: UserId,
    #[serde(default)]
    pub description: String,
}

/// Standing of a user inside an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub user: UserId,
    pub organization: OrgId,
    pub role: Role,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl Membership {
    #[must_use]
    pub const fn active(user: UserId, organization: OrgId, role: Role) -> Self {
        Self {
            user,
            organization,
            role,
            is_active: true,
        }
    }
}

/// Record collections known to the policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Organizations,
    Memberships,
    Meetings,
    AgendaItems,
    Motions,
    Votes,
    Minutes,
    Notifications,
    Templates,
}

impl Collection {
    pub const ALL: [Self; 9] = [
        Self::Organizations,
        Self::Memberships,
        Self::Meetings,
        Self::AgendaItems,
        Self::Motions,
        Self::Votes,
        Self::Minutes,
        Self::Notifications,
        Self::Templates,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::Memberships => "memberships",
            Self::Meetings => "meetings",
            Self::AgendaItems => "agenda_items",
            Self::Motions => "motions",
            Self::Votes => "votes",
            Self::Minutes => "minutes",
            Self::Notifications => "notifications",
            Self::Templates => "templates",
        }
    }

    /// Collections whose records are views of organization and membership
    /// rows rather than stored entities
    #[must_use]
    pub const fn is_derived(&self) -> bool {
        matches!(self, Self::Organizations | Self::Memberships)
    }

    /// Deployment module that ships this collection
    #[must_use]
    pub const fn module(&self) -> Module {
        match self {
            Self::Organizations | Self::Memberships => Module::Organizations,
            Self::Meetings | Self::AgendaItems => Module::Meetings,
            Self::Motions | Self::Votes => Module::Voting,
            Self::Minutes => Module::Minutes,
            Self::Notifications | Self::Templates => Module::Notifications,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == normalized)
            .ok_or_else(|| AuthzError::InvalidCollection(s.to_string()))
    }
}

/// Operation being authorized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    List,
    View,
    Create,
    Update,
    Delete,
}

impl Operation {
    pub const ALL: [Self; 5] = [
        Self::List,
        Self::View,
        Self::Create,
        Self::Update,
        Self::Delete,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::View => "view",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Read operations never reveal whether a denied record exists
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(self, Self::List | Self::View)
    }

    /// `list` is governed by the `view` rule
    #[must_use]
    pub const fn rule_key(self) -> Self {
        match self {
            Self::List => Self::View,
            other => other,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "list" => Ok(Self::List),
            "view" => Ok(Self::View),
            "create" => Ok(Self::Create),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            _ => Err(AuthzError::InvalidOperation(s.to_string())),
        }
    }
}

/// Relation a record hangs off
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OwnerRef {
    Organization(OrgId),
    Parent(RecordId),
}

/// Any persisted domain entity owned transitively by an organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub collection: Collection,
    pub owner: OwnerRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<UserId>,
}

impl Record {
    /// Record directly owned by an organization
    #[must_use]
    pub fn in_organization(
        id: impl Into<RecordId>,
        collection: Collection,
        organization: OrgId,
        created_by: Option<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            collection,
            owner: OwnerRef::Organization(organization),
            created_by,
            recipient: None,
        }
    }

    /// Sub-record owned through a parent record
    #[must_use]
    pub fn under_parent(
        id: impl Into<RecordId>,
        collection: Collection,
        parent: RecordId,
        created_by: Option<UserId>,
    ) -> Self {
        Self {
            id: id.into(),
            collection,
            owner: OwnerRef::Parent(parent),
            created_by,
            recipient: None,
        }
    }

    /// Record view of an organization itself
    #[must_use]
    pub fn organization(org: &Organization) -> Self {
        Self {
            id: RecordId::new(org.id.as_str()),
            collection: Collection::Organizations,
            owner: OwnerRef::Organization(org.id.clone()),
            created_by: Some(org.owner.clone()),
            recipient: None,
        }
    }

    /// Record view of a membership row, keyed `membership-<org>-<user>`
    #[must_use]
    pub fn membership(membership: &Membership) -> Self {
        Self {
            id: RecordId::new(format!(
                "membership-{}-{}",
                membership.organization, membership.user
            )),
            collection: Collection::Memberships,
            owner: OwnerRef::Organization(membership.organization.clone()),
            created_by: None,
            recipient: None,
        }
    }

    #[must_use]
    pub fn with_recipient(mut self, recipient: UserId) -> Self {
        self.recipient = Some(recipient);
        self
    }

    #[must_use]
    pub const fn parent(&self) -> Option<&RecordId> {
        match &self.owner {
            OwnerRef::Parent(id) => Some(id),
            OwnerRef::Organization(_) => None,
        }
    }
}
