//! Decoded identity claims of a provider-issued access token.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Role grants in one scope (`realm_access` or one `resource_access` entry).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleList {
    /// Granted role names.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Claims of a validated access token.
///
/// Registered claims plus the Keycloak role layout:
/// `realm_access.roles` and `resource_access.{client_id}.roles`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Provider-scoped stable subject identifier.
    #[serde(default)]
    pub sub: String,
    /// Issuer URL.
    #[serde(default)]
    pub iss: String,
    /// Expiry (Unix seconds).
    pub exp: u64,
    /// Issued-at (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Not-before (Unix seconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<u64>,
    /// Login name.
    #[serde(default)]
    pub preferred_username: String,
    /// Email address.
    #[serde(default)]
    pub email: String,
    /// Whether the provider verified the email address.
    #[serde(default)]
    pub email_verified: bool,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Realm-wide roles.
    #[serde(default)]
    pub realm_access: RoleList,
    /// Roles per client application.
    #[serde(default)]
    pub resource_access: HashMap<String, RoleList>,
}

impl Claims {
    /// Realm-wide role names.
    #[must_use]
    pub fn realm_roles(&self) -> &[String] {
        &self.realm_access.roles
    }

    /// Role names granted for `client_id`, empty when the client is absent.
    #[must_use]
    pub fn client_roles(&self, client_id: &str) -> &[String] {
        self.resource_access
            .get(client_id)
            .map(|access| access.roles.as_slice())
            .unwrap_or_default()
    }
}
