//! Bearer token authentication against an OIDC identity provider.
//!
//! # Request flow
//!
//! 1. Extract the bearer token from the `Authorization` header.
//! 2. Validate it locally: RSA algorithm, `kid`, signature against the
//!    provider's JWKS ([`KeyCache`]), `exp`/`nbf`, issuer prefix.
//! 3. Optionally confirm with the provider that the token is still active
//!    ([`IntrospectionClient`]).
//! 4. Reconcile the local user for the token's `sub` ([`SessionReconciler`]).
//! 5. Attach an [`AuthContext`] to the request.
//!
//! Routes can additionally be gated by role with [`require_role`].

pub mod audit;
pub mod claims;
pub mod introspection;
pub mod jwks;
pub mod middleware;
pub mod password;
pub mod provider;
pub mod roles;
pub mod session;
#[cfg(test)]
pub(crate) mod testing;
pub mod validator;

use std::sync::Arc;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use course_core::Envelope;

use crate::{Result, config::Config};

pub use claims::{Claims, RoleList};
pub use introspection::IntrospectionClient;
pub use jwks::{JwkRecord, JwkSet, JwksFetcher, KeyCache, KeySource, RsaPublicKey};
pub use middleware::{
    AuthContext, RoleGate, authenticate, extract_token, require_any_role, require_role, role_gate,
};
pub use provider::{IdentityProviderClient, ProviderError};
pub use roles::RoleChecker;
pub use session::SessionReconciler;
pub use validator::TokenValidator;

/// Authentication failures, each mapped to an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing or malformed `Authorization` header.
    #[error("{0}")]
    MalformedRequest(&'static str),

    /// The token is signed with a non-RSA algorithm.
    #[error("unexpected signing method: {0}")]
    UnsupportedAlgorithm(String),

    /// The token header has no `kid`.
    #[error("kid header not found in token")]
    MissingKeyId,

    /// The provider's JWKS has no key with this `kid`.
    #[error("key with ID {0} not found")]
    KeyNotFound(String),

    /// The JWKS entry for this `kid` is not an RSA key.
    #[error("key type {0} not supported")]
    UnsupportedKeyType(String),

    /// The JWKS could not be fetched or parsed.
    #[error("failed to get JWKS: {0}")]
    FetchError(String),

    /// The signature does not verify against the resolved key.
    #[error("token signature is invalid")]
    SignatureInvalid,

    /// The token's `exp` has passed.
    #[error("token has expired")]
    ExpiredToken,

    /// Any other structural failure (bad encoding, premature `nbf`, bad claims).
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// The token's issuer is not the configured realm.
    #[error("invalid token issuer: expected issuer to start with {expected}")]
    InvalidIssuer {
        /// Required issuer prefix.
        expected: String,
    },

    /// Introspection reported the token inactive (revoked or logged out).
    #[error("Token is no longer active")]
    TokenRevoked,

    /// The introspection call failed.
    #[error("token introspection failed: {0}")]
    IntrospectionFailed(String),

    /// Claims lack a field needed to build a local user.
    #[error("token is missing the {0} claim")]
    IncompleteClaims(&'static str),

    /// No local user exists for the subject.
    #[error("Invalid session: user not found")]
    UserNotFound,

    /// The local user store failed during reconciliation.
    #[error("Session validation error: {0}")]
    SessionReconciliationFailed(String),

    /// The authenticated user lacks the required role.
    #[error("Insufficient permissions")]
    InsufficientRole(String),

    /// A role gate ran without an authenticated identity.
    #[error("Authentication required")]
    Unauthenticated,

    /// A handler expected an [`AuthContext`] the middleware did not attach.
    #[error("Invalid claims type")]
    ClaimsTypeMismatch,
}

impl AuthError {
    /// HTTP status for this failure.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InsufficientRole(_) => StatusCode::FORBIDDEN,
            Self::SessionReconciliationFailed(_) | Self::ClaimsTypeMismatch => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// True for failures of local token validation.
    #[must_use]
    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedAlgorithm(_)
                | Self::MissingKeyId
                | Self::KeyNotFound(_)
                | Self::UnsupportedKeyType(_)
                | Self::FetchError(_)
                | Self::SignatureInvalid
                | Self::ExpiredToken
                | Self::InvalidToken(_)
                | Self::InvalidIssuer { .. }
        )
    }

    /// Message returned to the client.
    #[must_use]
    pub fn client_message(&self) -> String {
        if self.is_validation_failure() {
            format!("Invalid token: {self}")
        } else {
            self.to_string()
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(Envelope::failure(self.client_message()));
        if status == StatusCode::UNAUTHORIZED {
            (status, [("WWW-Authenticate", "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

/// Everything the authentication middleware needs, shared across requests.
pub struct Authenticator {
    /// Local signature and claim validation
    pub validator: TokenValidator,
    /// Remote revocation check, when enabled
    pub introspection: Option<IntrospectionClient>,
    /// Local user reconciliation
    pub sessions: SessionReconciler,
    /// Role lookups against the configured client
    pub roles: RoleChecker,
    /// Path that skips session reconciliation
    pub bootstrap_path: String,
}

impl Authenticator {
    /// Build from configuration, fetching keys from the provider's JWKS endpoint.
    pub fn from_config(
        config: &Config,
        users: Arc<dyn crate::store::UserStore>,
    ) -> Result<Self> {
        let identity = &config.identity;
        let fetcher = JwksFetcher::new(identity.jwks_url(), identity.http_timeout)?;
        let keys = Arc::new(KeyCache::new(Arc::new(fetcher), identity.key_cache_ttl));
        let validator =
            TokenValidator::new(keys, identity.realm_url()).with_leeway(identity.leeway);

        let introspection = if config.auth.introspection {
            Some(IntrospectionClient::new(
                identity.introspection_url(),
                identity.client_id.clone(),
                identity.client_secret(),
                identity.http_timeout,
            )?)
        } else {
            None
        };

        Ok(Self {
            validator,
            introspection,
            sessions: SessionReconciler::new(users, config.auth.default_role.clone()),
            roles: RoleChecker::new(identity.client_id.clone()),
            bootstrap_path: config.auth.bootstrap_path.clone(),
        })
    }

    /// Validate a token and, when enabled, confirm it is still active.
    pub async fn verify(&self, token: &str) -> std::result::Result<Claims, AuthError> {
        let claims = self.validator.validate(token).await?;
        if let Some(introspection) = &self.introspection {
            if !introspection.introspect(token).await? {
                return Err(AuthError::TokenRevoked);
            }
        }
        Ok(claims)
    }

    /// Whether `claims` grant `role` (realm roles first, then client roles).
    #[must_use]
    pub fn has_role(&self, claims: &Claims, role: &str) -> bool {
        self.roles.has_role(claims, role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_follows_taxonomy() {
        assert_eq!(
            AuthError::MalformedRequest("authorization header is required").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(AuthError::KeyNotFound("k1".into()).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenRevoked.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AuthError::InsufficientRole("admin".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            AuthError::SessionReconciliationFailed("db down".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AuthError::ClaimsTypeMismatch.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn validation_failures_are_prefixed_for_clients() {
        let err = AuthError::KeyNotFound("k9".into());
        assert_eq!(err.client_message(), "Invalid token: key with ID k9 not found");

        let err = AuthError::TokenRevoked;
        assert_eq!(err.client_message(), "Token is no longer active");
    }

    #[tokio::test]
    async fn unauthorized_response_carries_bearer_challenge() {
        let response = AuthError::MissingKeyId.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers().get("WWW-Authenticate").unwrap(),
            "Bearer"
        );
    }

    #[tokio::test]
    async fn forbidden_response_has_no_challenge() {
        let response = AuthError::InsufficientRole("admin".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get("WWW-Authenticate").is_none());
    }
}
