//! Deployment-stage module toggles
//!
//! OrgMeet is rolled out in five stages, each enabling one more module. The
//! resulting [`FeatureSet`] is computed once at startup and passed to the
//! evaluator and the visibility projector; it is never mutated afterwards.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// Functional module, in rollout order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Organizations and memberships
    Organizations,
    /// Meetings and agenda items
    Meetings,
    /// Motions and votes
    Voting,
    /// Minutes generation and approval
    Minutes,
    /// Notifications and templates
    Notifications,
}

impl Module {
    pub const ALL: [Self; 5] = [
        Self::Organizations,
        Self::Meetings,
        Self::Voting,
        Self::Minutes,
        Self::Notifications,
    ];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Organizations => "organizations",
            Self::Meetings => "meetings",
            Self::Voting => "voting",
            Self::Minutes => "minutes",
            Self::Notifications => "notifications",
        }
    }

    /// Stage that first ships this module
    #[must_use]
    pub const fn introduced_in(&self) -> Stage {
        match self {
            Self::Organizations => Stage(1),
            Self::Meetings => Stage(2),
            Self::Voting => Stage(3),
            Self::Minutes => Stage(4),
            Self::Notifications => Stage(5),
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Module {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == normalized)
            .ok_or_else(|| Error::Config(format!("Unknown module: {s}")))
    }
}

/// Deployment stage, 1 through 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Stage(u8);

impl Stage {
    pub const FIRST: Self = Self(1);
    pub const LAST: Self = Self(5);

    #[must_use]
    pub const fn new(stage: u8) -> Option<Self> {
        if stage >= Self::FIRST.0 && stage <= Self::LAST.0 {
            Some(Self(stage))
        } else {
            None
        }
    }

    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl Default for Stage {
    fn default() -> Self {
        Self::LAST
    }
}

impl TryFrom<u8> for Stage {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or_else(|| {
            Error::Config(format!(
                "Invalid deployment stage {value}: expected {}..={}",
                Self::FIRST.0,
                Self::LAST.0
            ))
        })
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.0)
    }
}

/// Immutable set of enabled modules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSet {
    enabled: BTreeSet<Module>,
}

impl FeatureSet {
    /// Every module enabled
    #[must_use]
    pub fn all() -> Self {
        Self::for_stage(Stage::LAST)
    }

    /// Modules shipped up to and including `stage`
    #[must_use]
    pub fn for_stage(stage: Stage) -> Self {
        Self {
            enabled: Module::ALL
                .into_iter()
                .filter(|m| m.introduced_in() <= stage)
                .collect(),
        }
    }

    /// Stage modules minus an explicit disable list
    #[must_use]
    pub fn with_disabled(stage: Stage, disabled: &[Module]) -> Self {
        let mut set = Self::for_stage(stage);
        for module in disabled {
            set.enabled.remove(module);
        }
        set
    }

    #[must_use]
    pub fn is_enabled(&self, module: Module) -> bool {
        self.enabled.contains(&module)
    }

    pub fn enabled(&self) -> impl Iterator<Item = Module> + '_ {
        self.enabled.iter().copied()
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::all()
    }
}
