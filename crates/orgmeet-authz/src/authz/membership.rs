//! Membership resolution

use std::fmt;
use std::sync::Arc;

use super::error::Result;
use super::role::Role;
use crate::store::AccessStore;
use crate::types::{Organization, UserId};

/// Resolves a user's effective role inside an organization
///
/// Structural ownership wins over any membership row: the organization's
/// owner is always [`Role::Owner`], even with no membership at all.
#[derive(Clone)]
pub struct MembershipResolver {
    store: Arc<dyn AccessStore>,
}

impl fmt::Debug for MembershipResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MembershipResolver").finish_non_exhaustive()
    }
}

impl MembershipResolver {
    #[must_use]
    pub fn new(store: Arc<dyn AccessStore>) -> Self {
        Self { store }
    }

    /// Effective role, or `None` when the user has no standing
    ///
    /// Store failures surface as `ResolutionFailed`; they never resolve to
    /// `None`, which would read as an ordinary denial.
    pub fn resolve_role(&self, user: &UserId, organization: &Organization) -> Result<Option<Role>> {
        if &organization.owner == user {
            return Ok(Some(Role::Owner));
        }

        let membership = self.store.active_membership(user, &organization.id)?;
        let role = membership
            .filter(|m| m.is_active && &m.user == user && m.organization == organization.id)
            .map(|m| m.role);

        tracing::trace!(
            user = %user,
            org = %organization.id,
            role = role.map(|r| r.as_str()),
            "Role resolved"
        );
        Ok(role)
    }
}
