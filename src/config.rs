//! Configuration management

use std::{
    env,
    path::{Path, PathBuf},
    time::Duration,
};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
    value::{Uncased, UncasedStr},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Prefix for environment overrides (`COURSE_API_SERVER__PORT=9000`).
pub const ENV_PREFIX: &str = "COURSE_API_";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server settings
    pub server: ServerConfig,
    /// Identity provider (OIDC realm) settings
    pub identity: IdentityConfig,
    /// Request authentication policy
    pub auth: AuthConfig,
    /// Attachment object storage
    pub storage: StorageConfig,
    /// Dotenv files loaded into the process environment before extraction.
    /// Files that don't exist are skipped.
    pub env_files: Vec<String>,
}

/// HTTP server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    /// Largest accepted attachment upload, in bytes
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            request_timeout: Duration::from_secs(30),
            max_upload_size: 32 * 1024 * 1024,
        }
    }
}

/// Identity provider settings.
///
/// Endpoint URLs are derived from `url` and `realm` using the Keycloak
/// layout (`{url}/realms/{realm}/protocol/openid-connect/...`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Base URL of the provider
    pub url: String,
    /// Realm that issues user tokens
    pub realm: String,
    /// Confidential client used for login, refresh and introspection
    pub client_id: String,
    /// Client secret (supports `env:VAR_NAME`)
    pub client_secret: String,
    /// Master-realm administrator used to provision users
    pub admin_username: String,
    /// Administrator password (supports `env:VAR_NAME`)
    pub admin_password: String,
    /// Timeout for every call to the provider
    #[serde(with = "humantime_serde")]
    pub http_timeout: Duration,
    /// How long fetched signing keys are trusted before a refetch
    #[serde(with = "humantime_serde")]
    pub key_cache_ttl: Duration,
    /// Clock skew tolerated on `exp`/`nbf`
    #[serde(with = "humantime_serde")]
    pub leeway: Duration,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081".to_string(),
            realm: "master".to_string(),
            client_id: "course-api".to_string(),
            client_secret: String::new(),
            admin_username: "admin".to_string(),
            admin_password: String::new(),
            http_timeout: Duration::from_secs(10),
            key_cache_ttl: Duration::from_secs(3600),
            leeway: Duration::ZERO,
        }
    }
}

impl IdentityConfig {
    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// `{url}/realms/{realm}`, which is also the required issuer prefix.
    #[must_use]
    pub fn realm_url(&self) -> String {
        format!("{}/realms/{}", self.base(), self.realm)
    }

    /// JWKS document URL.
    #[must_use]
    pub fn jwks_url(&self) -> String {
        format!("{}/protocol/openid-connect/certs", self.realm_url())
    }

    /// Token endpoint of the user realm.
    #[must_use]
    pub fn token_url(&self) -> String {
        format!("{}/protocol/openid-connect/token", self.realm_url())
    }

    /// Token introspection endpoint.
    #[must_use]
    pub fn introspection_url(&self) -> String {
        format!("{}/protocol/openid-connect/token/introspect", self.realm_url())
    }

    /// Token endpoint of the master realm, used for admin credentials.
    #[must_use]
    pub fn admin_token_url(&self) -> String {
        format!("{}/realms/master/protocol/openid-connect/token", self.base())
    }

    /// Admin REST base for the user realm.
    #[must_use]
    pub fn admin_realm_url(&self) -> String {
        format!("{}/admin/realms/{}", self.base(), self.realm)
    }

    /// Resolved client secret.
    #[must_use]
    pub fn client_secret(&self) -> String {
        resolve_secret(&self.client_secret)
    }

    /// Resolved administrator password.
    #[must_use]
    pub fn admin_password(&self) -> String {
        resolve_secret(&self.admin_password)
    }
}

/// Literal secrets shown as `***`; `env:` references and empty values are kept.
fn redact(value: &str) -> String {
    if value.is_empty() || value.starts_with("env:") {
        value.to_string()
    } else {
        "***".to_string()
    }
}

/// Request authentication policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Confirm every token with the provider's introspection endpoint
    pub introspection: bool,
    /// Path that authenticates without local session reconciliation
    pub bootstrap_path: String,
    /// Role stored for users whose token carries no realm roles
    pub default_role: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            introspection: false,
            bootstrap_path: "/api/v1/users/login".to_string(),
            default_role: course_core::DEFAULT_ROLE.to_string(),
        }
    }
}

/// Where attachment bytes are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Process memory, lost on restart
    #[default]
    Memory,
    /// Files below `storage.root`
    Filesystem,
}

/// Attachment object storage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend kind
    pub backend: StorageBackend,
    /// Root directory for the filesystem backend
    pub root: PathBuf,
    /// Lifetime of generated download links
    #[serde(with = "humantime_serde")]
    pub download_url_ttl: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            root: PathBuf::from("data/attachments"),
            download_url_ttl: Duration::from_secs(24 * 3600),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Sources, lowest precedence first: built-in defaults, the YAML file,
    /// the plain `KEYCLOAK_*`/`KC_*` variables, then `COURSE_API_*`
    /// variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
        }

        let config: Self = Self::figment(path)
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;

        // Env files may carry overrides; extract again once they are loaded.
        let config = if config.load_env_files() > 0 {
            Self::figment(path)
                .extract()
                .map_err(|e| Error::Config(e.to_string()))?
        } else {
            config
        };

        config.validate()?;
        Ok(config)
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::new();
        if let Some(p) = path {
            figment = figment.merge(Yaml::file(p));
        }
        figment
            .merge(Env::raw().filter_map(legacy_env_key))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load environment files into the process environment.
    /// Returns how many files were loaded.
    fn load_env_files(&self) -> usize {
        let mut loaded = 0;
        for path_str in &self.env_files {
            let path = Path::new(path_str);
            if !path.exists() {
                tracing::debug!("Env file not found (skipped): {path_str}");
                continue;
            }
            match dotenvy::from_path(path) {
                Ok(()) => {
                    tracing::info!("Loaded env file: {path_str}");
                    loaded += 1;
                }
                Err(e) => tracing::warn!("Failed to load env file {path_str}: {e}"),
            }
        }
        loaded
    }

    /// Copy with literal secrets masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        config.identity.client_secret = redact(&config.identity.client_secret);
        config.identity.admin_password = redact(&config.identity.admin_password);
        config
    }

    /// Reject settings the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.identity.url)
            .map_err(|e| Error::Config(format!("identity.url is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "identity.url must use http or https, got {}",
                url.scheme()
            )));
        }
        if self.identity.realm.trim().is_empty() {
            return Err(Error::Config("identity.realm must not be empty".to_string()));
        }
        if self.identity.client_id.trim().is_empty() {
            return Err(Error::Config(
                "identity.client_id must not be empty".to_string(),
            ));
        }
        if self.identity.http_timeout.is_zero() {
            return Err(Error::Config(
                "identity.http_timeout must be greater than zero".to_string(),
            ));
        }
        if !self.auth.bootstrap_path.starts_with('/') {
            return Err(Error::Config(
                "auth.bootstrap_path must start with '/'".to_string(),
            ));
        }
        if self.auth.default_role.trim().is_empty() {
            return Err(Error::Config("auth.default_role must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Map the provider's conventional variable names onto config keys.
fn legacy_env_key(key: &UncasedStr) -> Option<Uncased<'_>> {
    let mapped = match key.as_str().to_ascii_uppercase().as_str() {
        "KEYCLOAK_URL" => "identity.url",
        "KEYCLOAK_REALM" => "identity.realm",
        "KEYCLOAK_CLIENT_ID" => "identity.client_id",
        "KEYCLOAK_CLIENT_SECRET" => "identity.client_secret",
        "KC_ADMIN" => "identity.admin_username",
        "KC_ADMIN_PASSWORD" => "identity.admin_password",
        _ => return None,
    };
    Some(mapped.into())
}

/// Resolve a secret that may be given as `env:VAR_NAME`.
/// An unset variable resolves to an empty string.
fn resolve_secret(value: &str) -> String {
    match value.strip_prefix("env:") {
        Some(var_name) => env::var(var_name).unwrap_or_default(),
        None => value.to_string(),
    }
}

/// Human-readable duration serde support (`"100ms"`, `"30s"`, `"5m"`, `"1h"`,
/// or a bare number of seconds).
pub mod humantime_serde {
    use std::{fmt, time::Duration};

    use serde::{Deserializer, Serializer, de};

    /// Serialize Duration to human-readable string (e.g., "30s")
    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if duration.subsec_millis() == 0 {
            serializer.serialize_str(&format!("{}s", duration.as_secs()))
        } else {
            serializer.serialize_str(&format!("{}ms", duration.as_millis()))
        }
    }

    /// Deserialize a duration string or a number of seconds.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(DurationVisitor)
    }

    /// Parse `"100ms"`, `"30s"`, `"5m"`, `"1h"` or `"30"`.
    pub fn parse(s: &str) -> Result<Duration, String> {
        let s = s.trim();
        let (digits, scale_ms) = if let Some(v) = s.strip_suffix("ms") {
            (v, 1)
        } else if let Some(v) = s.strip_suffix('s') {
            (v, 1_000)
        } else if let Some(v) = s.strip_suffix('m') {
            (v, 60_000)
        } else if let Some(v) = s.strip_suffix('h') {
            (v, 3_600_000)
        } else {
            (s, 1_000)
        };
        let value: u64 = digits
            .trim()
            .parse()
            .map_err(|e| format!("invalid duration {s:?}: {e}"))?;
        value
            .checked_mul(scale_ms)
            .map(Duration::from_millis)
            .ok_or_else(|| format!("duration {s:?} is too large"))
    }

    struct DurationVisitor;

    impl de::Visitor<'_> for DurationVisitor {
        type Value = Duration;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a duration such as \"30s\" or a number of seconds")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<Duration, E> {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<Duration, E> {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must not be negative"))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<Duration, E> {
            parse(v).map_err(E::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_point_at_local_keycloak() {
        let config = Config::default();
        assert_eq!(
            config.identity.jwks_url(),
            "http://localhost:8081/realms/master/protocol/openid-connect/certs"
        );
        assert_eq!(config.identity.key_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.identity.http_timeout, Duration::from_secs(10));
        assert!(!config.auth.introspection);
        assert_eq!(config.auth.default_role, "ROLE_USER");
    }

    #[test]
    fn endpoint_urls_ignore_trailing_slash() {
        let identity = IdentityConfig {
            url: "https://idp.example/".to_string(),
            realm: "demo".to_string(),
            ..IdentityConfig::default()
        };
        assert_eq!(identity.realm_url(), "https://idp.example/realms/demo");
        assert_eq!(
            identity.introspection_url(),
            "https://idp.example/realms/demo/protocol/openid-connect/token/introspect"
        );
        assert_eq!(
            identity.admin_token_url(),
            "https://idp.example/realms/master/protocol/openid-connect/token"
        );
        assert_eq!(
            identity.admin_realm_url(),
            "https://idp.example/admin/realms/demo"
        );
    }

    #[test]
    fn load_reads_yaml_file() {
        // GIVEN: a YAML config with nested sections and duration strings
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 9090\nidentity:\n  url: https://idp.example\n  realm: demo\n  key_cache_ttl: 5m\nauth:\n  introspection: true\nstorage:\n  backend: filesystem\n  root: /tmp/attachments"
        )
        .unwrap();

        // WHEN: loading it
        let config = Config::load(Some(file.path())).unwrap();

        // THEN: values are merged over defaults
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.identity.realm, "demo");
        assert_eq!(config.identity.key_cache_ttl, Duration::from_secs(300));
        assert_eq!(config.identity.client_id, "course-api");
        assert!(config.auth.introspection);
        assert_eq!(config.storage.backend, StorageBackend::Filesystem);
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = Config::load(Some(Path::new("/nonexistent/course-api.yaml"))).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("not found")));
    }

    #[test]
    fn validate_rejects_non_http_identity_url() {
        let mut config = Config::default();
        config.identity.url = "ftp://idp.example".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_relative_bootstrap_path() {
        let mut config = Config::default();
        config.auth.bootstrap_path = "api/v1/users/login".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn resolve_secret_passes_literals_through() {
        assert_eq!(resolve_secret("s3cret"), "s3cret");
        assert_eq!(resolve_secret("env:COURSE_API_TEST_UNSET_SECRET_VAR"), "");
    }

    #[test]
    fn redacted_masks_literal_secrets_only() {
        let mut config = Config::default();
        config.identity.client_secret = "s3cret".to_string();
        config.identity.admin_password = "env:KC_ADMIN_PASSWORD".to_string();

        let shown = config.redacted();

        assert_eq!(shown.identity.client_secret, "***");
        assert_eq!(shown.identity.admin_password, "env:KC_ADMIN_PASSWORD");
        assert_eq!(config.identity.client_secret, "s3cret");
    }

    #[test]
    fn legacy_env_keys_map_to_identity_section() {
        let mapped = legacy_env_key(UncasedStr::new("KEYCLOAK_REALM")).unwrap();
        assert_eq!(mapped.as_str(), "identity.realm");
        assert!(legacy_env_key(UncasedStr::new("PATH")).is_none());
    }

    #[test]
    fn humantime_parse_units() {
        assert_eq!(humantime_serde::parse("100ms").unwrap(), Duration::from_millis(100));
        assert_eq!(humantime_serde::parse("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(humantime_serde::parse("5m").unwrap(), Duration::from_secs(300));
        assert_eq!(humantime_serde::parse("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(humantime_serde::parse("42").unwrap(), Duration::from_secs(42));
        assert!(humantime_serde::parse("soon").is_err());
    }
}
