//! Identity provider client: password and refresh grants, admin user creation.

use course_core::request::{AdminCreateUserRequest, TokenResponse};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};
use url::Url;

use crate::config::IdentityConfig;

/// Provider call failures.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The provider answered with a non-success status.
    #[error("HTTP {status} - {body}")]
    Rejected {
        /// Response status code
        status: u16,
        /// Response body
        body: String,
    },

    /// The request could not be sent or timed out.
    #[error("request failed: {0}")]
    Transport(String),

    /// The provider's response did not have the expected shape.
    #[error("unexpected response: {0}")]
    Malformed(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct UserRepresentation {
    id: String,
}

/// Client for the provider's token and admin endpoints.
pub struct IdentityProviderClient {
    http: reqwest::Client,
    token_url: String,
    admin_token_url: String,
    admin_realm_url: String,
    client_id: String,
    client_secret: String,
    admin_username: String,
    admin_password: String,
}

impl IdentityProviderClient {
    /// Client for the realm described by `config`.
    pub fn new(config: &IdentityConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()?,
            token_url: config.token_url(),
            admin_token_url: config.admin_token_url(),
            admin_realm_url: config.admin_realm_url(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret(),
            admin_username: config.admin_username.clone(),
            admin_password: config.admin_password(),
        })
    }

    /// Resource-owner password grant against the user realm.
    pub async fn login(&self, username: &str, password: &str) -> Result<TokenResponse, ProviderError> {
        let params = [
            ("grant_type", "password"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("username", username),
            ("password", password),
        ];
        debug!(username, "Requesting password grant");
        self.token_grant(&self.token_url, &params).await
    }

    /// Refresh-token grant against the user realm.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, ProviderError> {
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("refresh_token", refresh_token),
        ];
        self.token_grant(&self.token_url, &params).await
    }

    /// Administrator access token from the master realm (`admin-cli`).
    pub async fn admin_token(&self) -> Result<String, ProviderError> {
        let params = [
            ("grant_type", "password"),
            ("client_id", "admin-cli"),
            ("username", self.admin_username.as_str()),
            ("password", self.admin_password.as_str()),
        ];
        let tokens = self.token_grant(&self.admin_token_url, &params).await?;
        Ok(tokens.access_token)
    }

    /// Create an enabled user with a permanent password and grant its realm
    /// roles. Returns the provider's user id.
    pub async fn create_user(&self, req: &AdminCreateUserRequest) -> Result<String, ProviderError> {
        let token = self.admin_token().await?;

        let mut representation = json!({
            "username": req.username,
            "email": req.email,
            "enabled": true,
            "emailVerified": true,
            "credentials": [{
                "type": "password",
                "value": req.password,
                "temporary": false,
            }],
        });
        if let Some(first_name) = &req.first_name {
            representation["firstName"] = json!(first_name);
        }
        if let Some(last_name) = &req.last_name {
            representation["lastName"] = json!(last_name);
        }

        let response = self
            .http
            .post(self.admin_url(&["users"])?)
            .bearer_auth(&token)
            .json(&representation)
            .send()
            .await?;
        check(response).await?;

        let user_id = self.find_user_id(&token, &req.username).await?;
        if !req.roles.is_empty() {
            self.assign_realm_roles(&token, &user_id, &req.roles).await?;
        }

        info!(username = %req.username, user_id = %user_id, "Created provider user");
        Ok(user_id)
    }

    async fn find_user_id(&self, token: &str, username: &str) -> Result<String, ProviderError> {
        let response = self
            .http
            .get(self.admin_url(&["users"])?)
            .bearer_auth(token)
            .query(&[("username", username), ("exact", "true")])
            .send()
            .await?;
        let users: Vec<UserRepresentation> = check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;

        users
            .into_iter()
            .next()
            .map(|u| u.id)
            .ok_or_else(|| ProviderError::Malformed(format!("user {username} not found after creation")))
    }

    async fn assign_realm_roles(
        &self,
        token: &str,
        user_id: &str,
        roles: &[String],
    ) -> Result<(), ProviderError> {
        let mut representations = Vec::with_capacity(roles.len());
        for role in roles {
            let response = self
                .http
                .get(self.admin_url(&["roles", role.as_str()])?)
                .bearer_auth(token)
                .send()
                .await?;
            let representation: Value = check(response)
                .await?
                .json()
                .await
                .map_err(|e| ProviderError::Malformed(e.to_string()))?;
            representations.push(representation);
        }

        let response = self
            .http
            .post(self.admin_url(&["users", user_id, "role-mappings", "realm"])?)
            .bearer_auth(token)
            .json(&representations)
            .send()
            .await?;
        check(response).await?;
        debug!(user_id, roles = ?roles, "Assigned realm roles");
        Ok(())
    }

    async fn token_grant(&self, url: &str, params: &[(&str, &str)]) -> Result<TokenResponse, ProviderError> {
        let response = self.http.post(url).form(params).send().await?;
        check(response)
            .await?
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("failed to parse token response: {e}")))
    }

    fn admin_url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url =
            Url::parse(&self.admin_realm_url).map_err(|e| ProviderError::Malformed(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| ProviderError::Malformed("admin URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> IdentityProviderClient {
        let config = IdentityConfig {
            url: "http://idp.example/".to_string(),
            realm: "demo".to_string(),
            ..IdentityConfig::default()
        };
        IdentityProviderClient::new(&config).unwrap()
    }

    #[test]
    fn admin_urls_escape_segments() {
        let url = client().admin_url(&["roles", "course admin"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://idp.example/admin/realms/demo/roles/course%20admin"
        );
    }

    #[test]
    fn role_mapping_url_layout() {
        let url = client()
            .admin_url(&["users", "u-1", "role-mappings", "realm"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://idp.example/admin/realms/demo/users/u-1/role-mappings/realm"
        );
    }

    #[test]
    fn rejection_renders_status_and_body() {
        let err = ProviderError::Rejected {
            status: 401,
            body: r#"{"error":"invalid_grant"}"#.to_string(),
        };
        assert_eq!(err.to_string(), r#"HTTP 401 - {"error":"invalid_grant"}"#);
    }
}
