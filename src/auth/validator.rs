//! Local access token validation.

use std::{sync::Arc, time::Duration};

use jsonwebtoken::{Algorithm, Validation, errors::ErrorKind};
use tracing::debug;

use super::{AuthError, Claims, KeyCache};

/// Verifies RSA-signed provider tokens against cached JWKS keys.
pub struct TokenValidator {
    keys: Arc<KeyCache>,
    issuer_prefix: String,
    leeway: u64,
}

impl TokenValidator {
    /// Validator accepting tokens whose issuer starts with `issuer_prefix`
    /// (`{url}/realms/{realm}`).
    #[must_use]
    pub fn new(keys: Arc<KeyCache>, issuer_prefix: impl Into<String>) -> Self {
        Self {
            keys,
            issuer_prefix: issuer_prefix.into(),
            leeway: 0,
        }
    }

    /// Tolerate clock skew on `exp` and `nbf`.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway.as_secs();
        self
    }

    /// Signing key cache backing this validator.
    #[must_use]
    pub fn keys(&self) -> &Arc<KeyCache> {
        &self.keys
    }

    /// Required issuer prefix.
    #[must_use]
    pub fn issuer_prefix(&self) -> &str {
        &self.issuer_prefix
    }

    /// Validate `token` and return its claims.
    ///
    /// The algorithm and `kid` checks run before any key lookup, so a token
    /// rejected there never causes a JWKS fetch.
    pub async fn validate(&self, token: &str) -> Result<Claims, AuthError> {
        let header = jsonwebtoken::decode_header(token)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if !matches!(
            header.alg,
            Algorithm::RS256 | Algorithm::RS384 | Algorithm::RS512
        ) {
            return Err(AuthError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
        }

        let kid = header
            .kid
            .filter(|kid| !kid.is_empty())
            .ok_or(AuthError::MissingKeyId)?;

        let key = self.keys.resolve(&kid).await?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.leeway;
        validation.validate_nbf = true;
        // Keycloak access tokens carry `aud: account`; audience is not checked.
        validation.validate_aud = false;

        let data = jsonwebtoken::decode::<Claims>(token, &key.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => AuthError::SignatureInvalid,
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken(e.to_string()),
            })?;
        let claims = data.claims;

        if claims.iss.is_empty() || !claims.iss.starts_with(&self.issuer_prefix) {
            debug!(issuer = %claims.iss, "Token issuer rejected");
            return Err(AuthError::InvalidIssuer {
                expected: self.issuer_prefix.clone(),
            });
        }

        Ok(claims)
    }
}
