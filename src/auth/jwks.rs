//! Provider signing keys: JWKS fetching, RSA key reconstruction and caching.
//!
//! The cache holds every RSA key from the last fetched JWKS together with
//! a single refresh timestamp. A lookup is served from the cache only if
//! the `kid` is present and the cache is younger than the TTL; otherwise
//! the whole key set is refetched and the cache replaced. Concurrent
//! misses may fetch twice; the last writer wins.

use std::{collections::HashMap, sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::DecodingKey;
use parking_lot::RwLock;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, warn};

use super::AuthError;

/// A JSON Web Key Set document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkSet {
    /// Published keys.
    #[serde(default)]
    pub keys: Vec<JwkRecord>,
}

/// One JWK entry. Only the RSA members are interpreted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JwkRecord {
    /// Key ID.
    #[serde(default)]
    pub kid: String,
    /// Key type (`RSA`, `EC`, `oct`, ...).
    #[serde(default)]
    pub kty: String,
    /// Intended algorithm.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    /// Intended use (`sig` or `enc`).
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub key_use: Option<String>,
    /// RSA modulus, base64url without padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,
    /// RSA public exponent, base64url without padding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,
    /// X.509 certificate chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub x5c: Vec<String>,
}

/// RSA public key rebuilt from a JWK.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaPublicKey {
    modulus: Vec<u8>,
    exponent: u64,
}

impl RsaPublicKey {
    /// Rebuild from the base64url `n` and `e` members of a JWK.
    ///
    /// The modulus is an unsigned big-endian integer; the exponent is
    /// accumulated byte by byte (`e = e * 256 + byte`).
    pub fn from_components(n: &str, e: &str) -> Result<Self, String> {
        let n = URL_SAFE_NO_PAD
            .decode(n.trim_end_matches('='))
            .map_err(|err| format!("modulus is not base64url: {err}"))?;
        let e = URL_SAFE_NO_PAD
            .decode(e.trim_end_matches('='))
            .map_err(|err| format!("exponent is not base64url: {err}"))?;

        let first = n.iter().position(|b| *b != 0).unwrap_or(n.len());
        let modulus = n[first..].to_vec();
        if modulus.is_empty() {
            return Err("modulus is empty".to_string());
        }

        if e.is_empty() {
            return Err("exponent is empty".to_string());
        }
        let exponent = e
            .iter()
            .try_fold(0u64, |acc, byte| {
                acc.checked_mul(256)?.checked_add(u64::from(*byte))
            })
            .ok_or_else(|| "exponent does not fit in 64 bits".to_string())?;
        if exponent == 0 {
            return Err("exponent is zero".to_string());
        }

        Ok(Self { modulus, exponent })
    }

    /// Modulus bytes, big-endian, without leading zeros.
    #[must_use]
    pub fn modulus(&self) -> &[u8] {
        &self.modulus
    }

    /// Public exponent.
    #[must_use]
    pub fn exponent(&self) -> u64 {
        self.exponent
    }

    /// Modulus size in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        self.modulus.len() * 8 - self.modulus[0].leading_zeros() as usize
    }

    /// Key usable for signature verification.
    #[must_use]
    pub fn decoding_key(&self) -> DecodingKey {
        let bytes = self.exponent.to_be_bytes();
        let first = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        DecodingKey::from_rsa_raw_components(&self.modulus, &bytes[first..])
    }
}

/// Where signing keys come from.
#[async_trait::async_trait]
pub trait KeySource: Send + Sync + 'static {
    /// Fetch the current key set.
    async fn fetch(&self) -> Result<JwkSet, AuthError>;
}

/// Fetches the provider's JWKS document over HTTP.
pub struct JwksFetcher {
    http: reqwest::Client,
    url: String,
}

impl JwksFetcher {
    /// Fetcher for `url` with a per-request `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http: reqwest::Client::builder().timeout(timeout).build()?,
            url: url.into(),
        })
    }

    /// Document URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait::async_trait]
impl KeySource for JwksFetcher {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        debug!(url = %self.url, "Fetching JWKS");
        let response = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| AuthError::FetchError(e.to_string()))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(AuthError::FetchError(format!("HTTP {status}")));
        }

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::FetchError(format!("malformed JWKS document: {e}")))
    }
}

#[derive(Default)]
struct CacheState {
    keys: HashMap<String, RsaPublicKey>,
    refreshed_at: Option<Instant>,
}

impl CacheState {
    fn fresh(&self, kid: &str, ttl: Duration) -> Option<&RsaPublicKey> {
        let refreshed_at = self.refreshed_at?;
        if refreshed_at.elapsed() >= ttl {
            return None;
        }
        self.keys.get(kid)
    }
}

/// Signing key cache with a single staleness window for the whole set.
pub struct KeyCache {
    source: Arc<dyn KeySource>,
    ttl: Duration,
    state: RwLock<CacheState>,
}

impl KeyCache {
    /// Cache over `source`, trusting a fetched key set for `ttl`.
    #[must_use]
    pub fn new(source: Arc<dyn KeySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            state: RwLock::new(CacheState::default()),
        }
    }

    /// Key IDs currently cached.
    #[must_use]
    pub fn cached_kids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.state.read().keys.keys().cloned().collect();
        kids.sort();
        kids
    }

    /// Resolve the key for `kid`, fetching the key set on a miss or when stale.
    pub async fn resolve(&self, kid: &str) -> Result<RsaPublicKey, AuthError> {
        let cached = self.state.read().fresh(kid, self.ttl).cloned();
        if let Some(key) = cached {
            return Ok(key);
        }

        debug!(kid = %kid, "Signing key not cached or cache stale, refreshing");
        let set = self.source.fetch().await?;
        let (keys, wanted) = index_key_set(&set, kid);

        *self.state.write() = CacheState {
            keys,
            refreshed_at: Some(Instant::now()),
        };

        wanted.unwrap_or_else(|| Err(AuthError::KeyNotFound(kid.to_string())))
    }

    /// Fetch the key set now, replacing the cache. Returns the cached key IDs.
    pub async fn refresh(&self) -> Result<Vec<String>, AuthError> {
        let set = self.source.fetch().await?;
        let (keys, _) = index_key_set(&set, "");
        *self.state.write() = CacheState {
            keys,
            refreshed_at: Some(Instant::now()),
        };
        Ok(self.cached_kids())
    }
}

/// Build the kid → key map from a key set and pick out the result for `wanted`.
///
/// Unusable entries for other kids are skipped; for the wanted kid they
/// become the lookup error.
fn index_key_set(
    set: &JwkSet,
    wanted: &str,
) -> (
    HashMap<String, RsaPublicKey>,
    Option<Result<RsaPublicKey, AuthError>>,
) {
    let mut keys = HashMap::with_capacity(set.keys.len());
    let mut result = None;

    for jwk in &set.keys {
        let is_wanted = !wanted.is_empty() && jwk.kid == wanted;
        if jwk.kty != "RSA" {
            if is_wanted {
                result = Some(Err(AuthError::UnsupportedKeyType(jwk.kty.clone())));
            }
            continue;
        }

        let parsed = match (&jwk.n, &jwk.e) {
            (Some(n), Some(e)) => RsaPublicKey::from_components(n, e),
            _ => Err("missing n or e".to_string()),
        };

        match parsed {
            Ok(key) => {
                if is_wanted {
                    result = Some(Ok(key.clone()));
                }
                if !jwk.kid.is_empty() {
                    keys.insert(jwk.kid.clone(), key);
                }
            }
            Err(reason) => {
                warn!(kid = %jwk.kid, reason = %reason, "Skipping unusable JWKS entry");
                if is_wanted {
                    result = Some(Err(AuthError::FetchError(format!(
                        "key {} is malformed: {reason}",
                        jwk.kid
                    ))));
                }
            }
        }
    }

    (keys, result)
}
