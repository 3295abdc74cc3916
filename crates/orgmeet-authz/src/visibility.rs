//! UI visibility projection
//!
//! Decides which controls a client should render for a requester. This is a
//! display hint only: it has its own table, is never consulted by the
//! [`Evaluator`](crate::authz::Evaluator), and every action it reveals is
//! authorized again when submitted.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;
use crate::authz::Role;
use crate::features::{FeatureSet, Module};

/// Gated UI control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UiElement {
    EditOrganization,
    DeleteOrganization,
    ManageMembers,
    CreateMeeting,
    EditMeeting,
    CreateMotion,
    CastVote,
    ApproveMinutes,
    ViewNotification,
    CreateTemplate,
}

impl UiElement {
    pub const ALL: [Self; 10] = [
        Self::EditOrganization,
        Self::DeleteOrganization,
        Self::ManageMembers,
        Self::CreateMeeting,
        Self::EditMeeting,
        Self::CreateMotion,
        Self::CastVote,
        Self::ApproveMinutes,
        Self::ViewNotification,
        Self::CreateTemplate,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EditOrganization => "edit-organization",
            Self::DeleteOrganization => "delete-organization",
            Self::ManageMembers => "manage-members",
            Self::CreateMeeting => "create-meeting",
            Self::EditMeeting => "edit-meeting",
            Self::CreateMotion => "create-motion",
            Self::CastVote => "cast-vote",
            Self::ApproveMinutes => "approve-minutes",
            Self::ViewNotification => "view-notification",
            Self::CreateTemplate => "create-template",
        }
    }

    const fn module(self) -> Module {
        match self {
            Self::EditOrganization | Self::DeleteOrganization | Self::ManageMembers => {
                Module::Organizations
            }
            Self::CreateMeeting | Self::EditMeeting => Module::Meetings,
            Self::CreateMotion | Self::CastVote => Module::Voting,
            Self::ApproveMinutes => Module::Minutes,
            Self::ViewNotification | Self::CreateTemplate => Module::Notifications,
        }
    }

    const fn gate(self) -> Gate {
        match self {
            Self::EditOrganization | Self::DeleteOrganization | Self::ManageMembers => {
                Gate::AtLeast(Role::Admin)
            }
            Self::CreateMeeting | Self::CreateMotion | Self::CastVote | Self::CreateTemplate => {
                Gate::AtLeast(Role::Member)
            }
            Self::EditMeeting => Gate::CreatorOr(Role::Admin),
            Self::ApproveMinutes => Gate::CreatorOrOrgOwner,
            Self::ViewNotification => Gate::RecipientOrCreator,
        }
    }
}

impl fmt::Display for UiElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UiElement {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('_', "-");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == normalized)
            .ok_or_else(|| Error::Config(format!("Unknown UI element: {s}")))
    }
}

#[derive(Debug, Clone, Copy)]
enum Gate {
    AtLeast(Role),
    CreatorOr(Role),
    /// Matches the evaluator's org-owner clause, not the owner role
    CreatorOrOrgOwner,
    RecipientOrCreator,
}

/// Record facts the client already holds when rendering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewerFacts {
    #[serde(default)]
    pub is_creator: bool,
    #[serde(default)]
    pub is_recipient: bool,
    /// The requester is the organization's recorded owner
    #[serde(default)]
    pub is_org_owner: bool,
}

/// Pure role-to-visibility projection
#[derive(Debug, Clone, Default)]
pub struct Projector {
    features: FeatureSet,
}

impl Projector {
    #[must_use]
    pub const fn new(features: FeatureSet) -> Self {
        Self { features }
    }

    /// Whether `element` should be shown
    ///
    /// Hidden for requesters without standing and for modules that are not
    /// enabled in this deployment.
    #[must_use]
    pub fn project(&self, role: Option<Role>, element: UiElement, facts: &ViewerFacts) -> bool {
        if !self.features.is_enabled(element.module()) {
            return false;
        }
        let Some(role) = role else {
            return false;
        };
        match element.gate() {
            Gate::AtLeast(min) => role >= min,
            Gate::CreatorOr(min) => facts.is_creator || role >= min,
            Gate::CreatorOrOrgOwner => facts.is_creator || facts.is_org_owner,
            Gate::RecipientOrCreator => facts.is_recipient || facts.is_creator,
        }
    }

    /// Visibility of every element
    #[must_use]
    pub fn project_all(&self, role: Option<Role>, facts: &ViewerFacts) -> BTreeMap<UiElement, bool> {
        UiElement::ALL
            .into_iter()
            .map(|element| (element, self.project(role, element, facts)))
            .collect()
    }
}
