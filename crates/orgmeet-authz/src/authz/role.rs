//! Role registry

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::AuthzError;

/// Organization roles (hierarchical, `Viewer` lowest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "&'static str")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl Role {
    pub const ALL: [Self; 4] = [Self::Owner, Self::Admin, Self::Member, Self::Viewer];

    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "owner",
            Self::Admin => "admin",
            Self::Member => "member",
            Self::Viewer => "viewer",
        }
    }

    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Viewer => 0,
            Self::Member => 1,
            Self::Admin => 2,
            Self::Owner => 3,
        }
    }

    /// True iff `self` ranks at or above `required`
    #[must_use]
    pub const fn satisfies(&self, required: Self) -> bool {
        self.rank() >= required.rank()
    }
}

/// `has_min_role(actual, required)`
#[must_use]
pub const fn has_min_role(actual: Role, required: Role) -> bool {
    actual.satisfies(required)
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Self::Owner),
            "admin" => Ok(Self::Admin),
            "member" => Ok(Self::Member),
            "viewer" => Ok(Self::Viewer),
            _ => Err(AuthzError::InvalidRole(s.to_string())),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = AuthzError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Role> for &'static str {
    fn from(role: Role) -> Self {
        role.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_ordering() {
        assert!(Role::Owner > Role::Admin);
        assert!(Role::Admin > Role::Member);
        assert!(Role::Member > Role::Viewer);
    }

    #[test]
    fn test_has_min_role() {
        assert!(has_min_role(Role::Owner, Role::Admin));
        assert!(has_min_role(Role::Admin, Role::Admin));
        assert!(!has_min_role(Role::Member, Role::Admin));
        assert!(has_min_role(Role::Viewer, Role::Viewer));
        assert!(!has_min_role(Role::Viewer, Role::Member));
    }

    #[test]
    fn test_monotonic_over_all_pairs() {
        for required in Role::ALL {
            for actual in Role::ALL {
                if has_min_role(actual, required) {
                    for higher in Role::ALL.into_iter().filter(|r| *r >= actual) {
                        assert!(has_min_role(higher, required));
                    }
                }
            }
        }
    }

    #[test]
    fn test_role_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(AuthzError::InvalidRole(ref s)) if s == "superuser"
        ));
        // no case folding: stored roles are canonical
        assert!("Admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serde() {
        let json = serde_json::to_string(&Role::Admin).unwrap();
        assert_eq!(json, "\"admin\"");

        let role: Role = serde_json::from_str("\"viewer\"").unwrap();
        assert_eq!(role, Role::Viewer);

        let err = serde_json::from_str::<Role>("\"root\"").unwrap_err();
        assert!(err.to_string().contains("invalid role"));
    }
}
