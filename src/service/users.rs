use std::sync::Arc;

use course_core::{
    NewUser, User,
    request::{
        AdminCreateUserRequest, ChangePasswordRequest, LoginRequest, RefreshRequest,
        TokenResponse, UpdateUserRequest,
    },
};
use tracing::{info, warn};

use super::ServiceError;
use crate::{
    auth::{
        AuthContext, Authenticator, IdentityProviderClient, ProviderError,
        audit::AuditEvent,
        password::{hash_password_blocking, verify_password_blocking},
    },
    store::UserStore,
};

/// Login proxy, profile management and administrative provisioning.
#[derive(Clone)]
pub struct UserService {
    auth: Arc<Authenticator>,
    provider: Arc<IdentityProviderClient>,
    default_role: String,
}

impl UserService {
    /// Service using `auth` for token checks and `provider` for grants.
    pub fn new(
        auth: Arc<Authenticator>,
        provider: Arc<IdentityProviderClient>,
        default_role: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            provider,
            default_role: default_role.into(),
        }
    }

    fn users(&self) -> &Arc<dyn UserStore> {
        self.auth.sessions.users()
    }

    /// Password grant, then validate the access token and reconcile the
    /// local user before handing the tokens back.
    pub async fn login(&self, req: &LoginRequest) -> Result<TokenResponse, ServiceError> {
        req.validate()?;
        let tokens = self
            .provider
            .login(&req.username, &req.password)
            .await
            .map_err(|e| grant_failure("login failed", e))?;

        let claims = self.auth.verify(&tokens.access_token).await?;
        let user = self.auth.sessions.ensure_local_user(&claims).await?;
        info!(user_id = user.id, "User logged in");
        Ok(tokens)
    }

    /// Refresh-token grant.
    pub async fn refresh(&self, req: &RefreshRequest) -> Result<TokenResponse, ServiceError> {
        req.validate()?;
        self.provider
            .refresh(&req.refresh_token)
            .await
            .map_err(|e| grant_failure("token refresh failed", e))
    }

    /// Local user for the caller, created on first claim.
    pub async fn claim(&self, ctx: &AuthContext) -> Result<User, ServiceError> {
        Ok(self.auth.sessions.ensure_local_user(&ctx.claims).await?)
    }

    /// The caller's local user as currently stored.
    pub async fn me(&self, ctx: &AuthContext) -> Result<User, ServiceError> {
        Ok(self.auth.sessions.get_user_by_sub(&ctx.subject).await?)
    }

    /// Change the caller's username and/or email. Blank fields are ignored.
    pub async fn update_profile(
        &self,
        ctx: &AuthContext,
        req: &UpdateUserRequest,
    ) -> Result<User, ServiceError> {
        let user = self.me(ctx).await?;
        if req.username().is_none() && req.email().is_none() {
            return Ok(user);
        }
        if req.email().is_some_and(|email| !email.contains('@')) {
            return Err(ServiceError::Validation("email is invalid".to_string()));
        }
        Ok(self
            .users()
            .update_profile(user.id, req.username(), req.email())
            .await?)
    }

    /// Replace the caller's password hash after checking the current password.
    pub async fn change_password(
        &self,
        ctx: &AuthContext,
        req: &ChangePasswordRequest,
    ) -> Result<(), ServiceError> {
        req.validate()?;
        let user = self.me(ctx).await?;

        if !verify_password_blocking(req.current_password.clone(), user.password_hash.clone()).await {
            return Err(ServiceError::Validation(
                "current password is incorrect".to_string(),
            ));
        }

        let hash = hash_password_blocking(req.new_password.clone()).await?;
        self.users().update_password(user.id, hash).await?;
        info!(user_id = user.id, "Password changed");
        Ok(())
    }

    /// Create the user at the identity provider, grant its realm roles and
    /// link a local user to the new provider id.
    pub async fn admin_create(
        &self,
        ctx: &AuthContext,
        req: &AdminCreateUserRequest,
    ) -> Result<User, ServiceError> {
        req.validate()?;

        // Local conflicts must surface before the provider account exists
        if self.users().find_by_username(&req.username).await?.is_some() {
            return Err(ServiceError::Validation("username already exists".to_string()));
        }
        if self.users().find_by_email(&req.email).await?.is_some() {
            return Err(ServiceError::Validation("email already exists".to_string()));
        }

        let provider_id = self
            .provider
            .create_user(req)
            .await
            .map_err(ServiceError::Identity)?;

        let password_hash = hash_password_blocking(req.password.clone()).await?;
        let roles = if req.roles.is_empty() {
            self.default_role.clone()
        } else {
            req.roles.join(",")
        };

        let user = self
            .users()
            .create(NewUser {
                username: req.username.clone(),
                email: req.email.clone(),
                password_hash,
                roles,
                sub: Some(provider_id),
            })
            .await?;

        AuditEvent::created(&user, &ctx.username).emit();
        Ok(user)
    }
}

fn grant_failure(context: &str, error: ProviderError) -> ServiceError {
    match error {
        ProviderError::Rejected { .. } => {
            warn!(error = %error, "{context}");
            ServiceError::Unauthorized(format!("{context}: {error}"))
        }
        other => ServiceError::Identity(other),
    }
}
