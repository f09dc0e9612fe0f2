//! Role checks against token claims.

use super::Claims;

/// Checks realm and client role grants for one configured client.
#[derive(Debug, Clone)]
pub struct RoleChecker {
    client_id: String,
}

impl RoleChecker {
    /// Checker for roles granted to `client_id`.
    #[must_use]
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
        }
    }

    /// Exact, case-sensitive match against realm roles, then client roles.
    #[must_use]
    pub fn has_role(&self, claims: &Claims, role: &str) -> bool {
        has_role(claims, role, &self.client_id)
    }

    /// True if any of `roles` is granted.
    #[must_use]
    pub fn has_any_role(&self, claims: &Claims, roles: &[&str]) -> bool {
        roles.iter().any(|role| self.has_role(claims, role))
    }
}

/// Exact, case-sensitive match against realm roles, then the roles of `client_id`.
#[must_use]
pub fn has_role(claims: &Claims, role: &str, client_id: &str) -> bool {
    claims.realm_roles().iter().any(|r| r == role)
        || claims.client_roles(client_id).iter().any(|r| r == role)
}
