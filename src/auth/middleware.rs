//! Request authentication and role gates.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{HeaderMap, Request, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use course_core::{Id, User};
use tracing::{debug, warn};

use super::{AuthError, Authenticator, Claims, RoleChecker, audit::AuditEvent};

/// Identity attached to every authenticated request.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Validated token claims
    pub claims: Claims,
    /// Provider subject
    pub subject: String,
    /// Login name from the token
    pub username: String,
    /// Email from the token
    pub email: String,
    /// Local user, absent on the bootstrap path
    pub user: Option<User>,
}

impl AuthContext {
    /// Context for `claims` and the reconciled local user.
    #[must_use]
    pub fn new(claims: Claims, user: Option<User>) -> Self {
        Self {
            subject: claims.sub.clone(),
            username: claims.preferred_username.clone(),
            email: claims.email.clone(),
            claims,
            user,
        }
    }

    /// Local user id, when reconciled.
    #[must_use]
    pub fn user_id(&self) -> Option<Id> {
        self.user.as_ref().map(|u| u.id)
    }

    /// [`AuthError::InsufficientRole`] unless one of `roles` is granted.
    pub fn require_any_role(&self, checker: &RoleChecker, roles: &[&str]) -> Result<(), AuthError> {
        if checker.has_any_role(&self.claims, roles) {
            Ok(())
        } else {
            Err(AuthError::InsufficientRole(roles.join("|")))
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for AuthContext {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::ClaimsTypeMismatch)
    }
}

const BAD_FORMAT: &str = "authorization header format must be Bearer {token}";

/// The token of an `Authorization: Bearer <token>` header.
pub fn extract_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MalformedRequest("authorization header is required"))?;

    let value = value
        .to_str()
        .map_err(|_| AuthError::MalformedRequest(BAD_FORMAT))?;

    let mut parts = value.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(AuthError::MalformedRequest(BAD_FORMAT)),
    }
}

/// Authentication middleware.
///
/// Extracts and validates the bearer token, optionally introspects it,
/// reconciles the local user (except on the bootstrap path) and attaches
/// an [`AuthContext`].
pub async fn authenticate(
    State(auth): State<Arc<Authenticator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    let token = match extract_token(request.headers()) {
        Ok(token) => token.to_string(),
        Err(e) => return deny(e, &path),
    };

    let claims = match auth.verify(&token).await {
        Ok(claims) => claims,
        Err(e) => return deny(e, &path),
    };

    let user = if path == auth.bootstrap_path {
        debug!(path = %path, "Bootstrap path, skipping session reconciliation");
        None
    } else {
        match auth.sessions.ensure_local_user(&claims).await {
            Ok(user) => Some(user),
            Err(e) => return deny(e, &path),
        }
    };

    AuditEvent::granted(&claims, user.as_ref(), &path).emit();
    request.extensions_mut().insert(AuthContext::new(claims, user));
    next.run(request).await
}

fn deny(error: AuthError, path: &str) -> Response {
    warn!(path = %path, error = %error, "Authentication failed");
    AuditEvent::denied(error.to_string(), path).emit();
    error.into_response()
}

/// Role requirement enforced by [`role_gate`].
#[derive(Debug, Clone)]
pub struct RoleGate {
    checker: RoleChecker,
    roles: Arc<[String]>,
}

/// Gate admitting users granted `role`.
#[must_use]
pub fn require_role(checker: &RoleChecker, role: &str) -> RoleGate {
    require_any_role(checker, &[role])
}

/// Gate admitting users granted any of `roles`.
#[must_use]
pub fn require_any_role(checker: &RoleChecker, roles: &[&str]) -> RoleGate {
    RoleGate {
        checker: checker.clone(),
        roles: roles.iter().map(ToString::to_string).collect(),
    }
}

/// Role gate middleware. Layer it inside [`authenticate`].
pub async fn role_gate(State(gate): State<RoleGate>, request: Request<Body>, next: Next) -> Response {
    let Some(ctx) = request.extensions().get::<AuthContext>() else {
        return AuthError::Unauthenticated.into_response();
    };

    if gate.roles.iter().any(|role| gate.checker.has_role(&ctx.claims, role)) {
        return next.run(request).await;
    }

    let required = gate.roles.join("|");
    AuditEvent::forbidden(&ctx.claims, &required, request.uri().path()).emit();
    AuthError::InsufficientRole(required).into_response()
}
