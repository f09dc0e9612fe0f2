//! Shared fixtures for auth unit tests: fixed RSA keys, token minting and
//! an in-process key source.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use jsonwebtoken::{Algorithm, EncodingKey, Header};

use super::{
    AuthError, Authenticator, Claims, JwkRecord, JwkSet, KeyCache, KeySource, RoleChecker,
    RoleList, SessionReconciler, TokenValidator,
};
use crate::store::UserStore;

pub const ISSUER: &str = "https://idp.example/realms/demo";
pub const SIGNING_KEY_PEM: &[u8] = include_bytes!("../../tests/fixtures/signing_key.pem");
pub const ROGUE_KEY_PEM: &[u8] = include_bytes!("../../tests/fixtures/rogue_key.pem");
const COMPONENTS: &str = include_str!("../../tests/fixtures/public_components.json");

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn claims_for(sub: &str, realm_roles: &[&str]) -> Claims {
    Claims {
        sub: sub.to_string(),
        iss: ISSUER.to_string(),
        exp: now() + 300,
        iat: Some(now()),
        nbf: None,
        preferred_username: "ada".to_string(),
        email: "ada@example.com".to_string(),
        email_verified: true,
        name: Some("Ada Lovelace".to_string()),
        realm_access: RoleList {
            roles: realm_roles.iter().map(ToString::to_string).collect(),
        },
        resource_access: HashMap::new(),
    }
}

pub fn mint_with_key(claims: &Claims, kid: &str, pem: &[u8]) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

pub fn mint(claims: &Claims, kid: &str) -> String {
    mint_with_key(claims, kid, SIGNING_KEY_PEM)
}

pub fn mint_with_header(claims: &Claims, header: Header) -> String {
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY_PEM).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

pub fn signing_jwk(kid: &str) -> JwkRecord {
    let components: serde_json::Value = serde_json::from_str(COMPONENTS).unwrap();
    JwkRecord {
        kid: kid.to_string(),
        kty: "RSA".to_string(),
        alg: Some("RS256".to_string()),
        key_use: Some("sig".to_string()),
        n: components["signing"]["n"].as_str().map(ToString::to_string),
        e: components["signing"]["e"].as_str().map(ToString::to_string),
        x5c: Vec::new(),
    }
}

/// Key source serving a fixed set and counting fetches.
pub struct StaticKeySource {
    set: JwkSet,
    fetches: AtomicUsize,
}

impl StaticKeySource {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl KeySource for StaticKeySource {
    async fn fetch(&self) -> Result<JwkSet, AuthError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.set.clone())
    }
}

/// Source serving `set`.
pub fn serving(set: JwkSet) -> Arc<StaticKeySource> {
    Arc::new(StaticKeySource {
        set,
        fetches: AtomicUsize::new(0),
    })
}

/// Source publishing the signing key under each of `kids`.
pub fn static_keys(kids: &[&str]) -> Arc<StaticKeySource> {
    serving(JwkSet {
        keys: kids.iter().map(|kid| signing_jwk(kid)).collect(),
    })
}

/// Authenticator trusting the signing key under `k1`, without introspection.
pub fn authenticator(users: Arc<dyn UserStore>) -> Authenticator {
    let keys = Arc::new(KeyCache::new(static_keys(&["k1"]), Duration::from_secs(3600)));
    Authenticator {
        validator: TokenValidator::new(keys, ISSUER),
        introspection: None,
        sessions: SessionReconciler::new(users, "ROLE_USER"),
        roles: RoleChecker::new("course-api"),
        bootstrap_path: "/api/v1/users/login".to_string(),
    }
}
