//! Remote token introspection (RFC 7662).
//!
//! Asks the provider on every call whether a token is still active. No
//! result is cached: a token revoked at the provider is rejected on the
//! next request even though its signature remains valid.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use super::AuthError;

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
}

/// Client for the provider's introspection endpoint.
pub struct IntrospectionClient {
    http: reqwest::Client,
    url: String,
    client_id: String,
    client_secret: String,
}

impl IntrospectionClient {
    /// Client posting to `url` with the given confidential client credentials.
    pub fn new(
        url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        })
    }

    /// Whether the provider still considers `token` active.
    pub async fn introspect(&self, token: &str) -> Result<bool, AuthError> {
        if token.is_empty() {
            return Err(AuthError::IntrospectionFailed("token is required".to_string()));
        }

        let params = [
            ("token", token),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
        ];

        let response = self
            .http
            .post(&self.url)
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::IntrospectionFailed(format!("request failed: {e}")))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::IntrospectionFailed(format!(
                "HTTP {status} - {body}"
            )));
        }

        let result: IntrospectionResponse = response
            .json()
            .await
            .map_err(|e| AuthError::IntrospectionFailed(format!("malformed response: {e}")))?;

        debug!(active = result.active, "Token introspected");
        Ok(result.active)
    }
}
