//! Local user reconciliation for provider-authenticated subjects.

use std::sync::Arc;

use course_core::{NewUser, User};
use tracing::{debug, info};

use super::{AuthError, Claims, audit::AuditEvent, password::placeholder_hash_blocking};
use crate::store::{StoreError, UserStore};

/// Makes sure every authenticated subject has a local user record.
pub struct SessionReconciler {
    users: Arc<dyn UserStore>,
    default_role: String,
}

impl SessionReconciler {
    /// Reconciler over `users`; new users without realm roles get `default_role`.
    pub fn new(users: Arc<dyn UserStore>, default_role: impl Into<String>) -> Self {
        Self {
            users,
            default_role: default_role.into(),
        }
    }

    /// Underlying user store.
    #[must_use]
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }

    /// Return the local user for `claims.sub`, creating it on first sight.
    ///
    /// Concurrent first logins for one subject race on the store's unique
    /// `sub` constraint; the loser re-reads and returns the winner's row.
    pub async fn ensure_local_user(&self, claims: &Claims) -> Result<User, AuthError> {
        if claims.sub.is_empty() {
            return Err(AuthError::IncompleteClaims("sub"));
        }
        if claims.preferred_username.is_empty() {
            return Err(AuthError::IncompleteClaims("preferred_username"));
        }
        if claims.email.is_empty() {
            return Err(AuthError::IncompleteClaims("email"));
        }

        if let Some(user) = self.find(&claims.sub).await? {
            debug!(sub = %claims.sub, user_id = user.id, "Local user found");
            return Ok(user);
        }

        let password_hash = placeholder_hash_blocking()
            .await
            .map_err(|e| AuthError::SessionReconciliationFailed(e.to_string()))?;

        let roles = if claims.realm_roles().is_empty() {
            self.default_role.clone()
        } else {
            claims.realm_roles().join(",")
        };

        let new_user = NewUser {
            username: claims.preferred_username.clone(),
            email: claims.email.clone(),
            password_hash,
            roles,
            sub: Some(claims.sub.clone()),
        };

        match self.users.create(new_user).await {
            Ok(user) => {
                info!(sub = %claims.sub, user_id = user.id, "Provisioned local user");
                AuditEvent::provisioned(&user).emit();
                Ok(user)
            }
            Err(StoreError::Conflict(reason)) => {
                debug!(sub = %claims.sub, %reason, "Insert conflicted, re-reading");
                self.find(&claims.sub).await?.ok_or_else(|| {
                    AuthError::SessionReconciliationFailed(format!("failed to create user: {reason}"))
                })
            }
            Err(e) => Err(AuthError::SessionReconciliationFailed(format!(
                "failed to create user: {e}"
            ))),
        }
    }

    /// Whether a local user exists for `sub`.
    pub async fn validate_session(&self, sub: &str) -> Result<bool, AuthError> {
        if sub.is_empty() {
            return Err(AuthError::IncompleteClaims("sub"));
        }
        Ok(self.find(sub).await?.is_some())
    }

    /// The local user for `sub`.
    pub async fn get_user_by_sub(&self, sub: &str) -> Result<User, AuthError> {
        self.find(sub).await?.ok_or(AuthError::UserNotFound)
    }

    async fn find(&self, sub: &str) -> Result<Option<User>, AuthError> {
        self.users
            .find_by_sub(sub)
            .await
            .map_err(|e| AuthError::SessionReconciliationFailed(format!("failed to get user: {e}")))
    }
}
