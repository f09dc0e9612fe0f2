//! Shared integration test harness: a local mock identity provider, token
//! minting with the fixture keys, and an app wired against both.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use axum::{
    Form, Json, Router,
    body::{Body, to_bytes},
    extract::{Path, Query, State},
    http::{Request, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use course_api::{
    api::{AppState, create_router},
    auth::{Authenticator, Claims, IdentityProviderClient, RoleList},
    config::Config,
    service::{CatalogService, UserService},
    storage::MemoryObjectStore,
    store::MemoryStore,
};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tower::ServiceExt;

pub const REALM: &str = "demo";
pub const SIGNING_KEY_PEM: &[u8] = include_bytes!("../fixtures/signing_key.pem");
pub const ROGUE_KEY_PEM: &[u8] = include_bytes!("../fixtures/rogue_key.pem");
const COMPONENTS: &str = include_str!("../fixtures/public_components.json");

/// Password the mock provider accepts for user `ada`.
pub const ADA_PASSWORD: &str = "correct-horse";
/// Refresh token the mock provider accepts.
pub const REFRESH_TOKEN: &str = "refresh-1";

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// What the mock provider has seen and how it answers introspection.
#[derive(Default)]
pub struct IdpState {
    pub base: String,
    pub jwks_fetches: AtomicUsize,
    pub introspections: AtomicUsize,
    pub token_grants: AtomicUsize,
    pub inactive: AtomicBool,
    pub created_users: Mutex<Vec<Value>>,
    pub role_mappings: Mutex<Vec<(String, Value)>>,
}

impl IdpState {
    pub fn issuer(&self) -> String {
        format!("{}/realms/{REALM}", self.base)
    }

    pub fn jwks_fetches(&self) -> usize {
        self.jwks_fetches.load(Ordering::SeqCst)
    }

    pub fn introspections(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }

    pub fn revoke_all(&self) {
        self.inactive.store(true, Ordering::SeqCst);
    }
}

/// A running mock provider bound to `127.0.0.1:0`.
pub struct MockIdp {
    pub state: Arc<IdpState>,
}

impl MockIdp {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(IdpState {
            base: format!("http://{addr}"),
            ..IdpState::default()
        });

        let router = Router::new()
            .route("/realms/{realm}/protocol/openid-connect/certs", get(certs))
            .route(
                "/realms/{realm}/protocol/openid-connect/token/introspect",
                post(introspect),
            )
            .route("/realms/{realm}/protocol/openid-connect/token", post(token))
            .route(
                "/admin/realms/{realm}/users",
                get(find_users).post(create_user),
            )
            .route("/admin/realms/{realm}/roles/{role}", get(role))
            .route(
                "/admin/realms/{realm}/users/{id}/role-mappings/realm",
                post(map_roles),
            )
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        Self { state }
    }

    pub fn base(&self) -> &str {
        &self.state.base
    }

    pub fn issuer(&self) -> String {
        self.state.issuer()
    }

    /// Claims for `sub` issued by this provider.
    pub fn claims(&self, sub: &str, realm_roles: &[&str]) -> Claims {
        claims_for(&self.issuer(), sub, realm_roles)
    }

    /// Config trusting this provider.
    pub fn config(&self, introspection: bool) -> Config {
        let mut config = Config::default();
        config.identity.url = self.state.base.clone();
        config.identity.realm = REALM.to_string();
        config.identity.client_secret = "client-secret".to_string();
        config.identity.admin_password = "admin-secret".to_string();
        config.identity.http_timeout = Duration::from_secs(5);
        config.auth.introspection = introspection;
        config.server.max_upload_size = 1024;
        config
    }
}

pub fn claims_for(issuer: &str, sub: &str, realm_roles: &[&str]) -> Claims {
    Claims {
        sub: sub.to_string(),
        iss: issuer.to_string(),
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

/// RS256 token signed with the published key `k1`.
pub fn mint(claims: &Claims) -> String {
    mint_with_key(claims, "k1", SIGNING_KEY_PEM)
}

fn jwks() -> Value {
    let components: Value = serde_json::from_str(COMPONENTS).unwrap();
    json!({
        "keys": [
            {
                "kid": "k1",
                "kty": "RSA",
                "alg": "RS256",
                "use": "sig",
                "n": components["signing"]["n"],
                "e": components["signing"]["e"],
            },
            {
                "kid": "enc-1",
                "kty": "EC",
                "use": "enc",
            }
        ]
    })
}

async fn certs(State(state): State<Arc<IdpState>>, Path(realm): Path<String>) -> Response {
    state.jwks_fetches.fetch_add(1, Ordering::SeqCst);
    if realm != REALM {
        return StatusCode::NOT_FOUND.into_response();
    }
    Json(jwks()).into_response()
}

async fn introspect(
    State(state): State<Arc<IdpState>>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.introspections.fetch_add(1, Ordering::SeqCst);
    if form.get("client_secret").map(String::as_str) != Some("client-secret") {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "unauthorized_client"})))
            .into_response();
    }
    let active = !state.inactive.load(Ordering::SeqCst);
    Json(json!({ "active": active })).into_response()
}

async fn token(
    State(state): State<Arc<IdpState>>,
    Path(realm): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> Response {
    state.token_grants.fetch_add(1, Ordering::SeqCst);
    let field = |name: &str| form.get(name).map(String::as_str).unwrap_or_default();

    let granted = match (realm.as_str(), field("grant_type")) {
        ("master", "password") => {
            field("client_id") == "admin-cli" && field("password") == "admin-secret"
        }
        (REALM, "password") => field("username") == "ada" && field("password") == ADA_PASSWORD,
        (REALM, "refresh_token") => field("refresh_token") == REFRESH_TOKEN,
        _ => false,
    };
    if !granted {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_grant", "error_description": "Invalid user credentials"})),
        )
            .into_response();
    }

    let access_token = if realm == "master" {
        "admin-token".to_string()
    } else {
        mint(&claims_for(&state.issuer(), "abc-123", &["teacher"]))
    };
    Json(json!({
        "access_token": access_token,
        "refresh_token": REFRESH_TOKEN,
        "token_type": "Bearer",
        "expires_in": 300,
    }))
    .into_response()
}

fn is_admin(headers: &axum::http::HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some("Bearer admin-token")
}

async fn create_user(
    State(state): State<Arc<IdpState>>,
    headers: axum::http::HeaderMap,
    Json(user): Json<Value>,
) -> Response {
    if !is_admin(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if user["username"] == "taken" {
        return (
            StatusCode::CONFLICT,
            Json(json!({"errorMessage": "User exists with same username"})),
        )
            .into_response();
    }
    state.created_users.lock().push(user);
    StatusCode::CREATED.into_response()
}

async fn find_users(
    State(state): State<Arc<IdpState>>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    let username = query.get("username").cloned().unwrap_or_default();
    let known = state
        .created_users
        .lock()
        .iter()
        .any(|u| u["username"] == username.as_str());
    if known && query.get("exact").map(String::as_str) == Some("true") {
        Json(json!([{ "id": format!("idp-{username}"), "username": username }])).into_response()
    } else {
        Json(json!([])).into_response()
    }
}

async fn role(Path((_realm, role)): Path<(String, String)>) -> Response {
    if role == "ghost" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "Could not find role"})),
        )
            .into_response();
    }
    Json(json!({ "id": format!("role-{role}"), "name": role })).into_response()
}

async fn map_roles(
    State(state): State<Arc<IdpState>>,
    Path((_realm, id)): Path<(String, String)>,
    Json(roles): Json<Value>,
) -> StatusCode {
    state.role_mappings.lock().push((id, roles));
    StatusCode::NO_CONTENT
}

/// The API wired against a mock provider, with handles on its stores.
pub struct TestApp {
    pub idp: MockIdp,
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub objects: Arc<MemoryObjectStore>,
}

impl TestApp {
    pub async fn start(introspection: bool) -> Self {
        let idp = MockIdp::start().await;
        let config = idp.config(introspection);

        let store = Arc::new(MemoryStore::new());
        let objects = Arc::new(MemoryObjectStore::new());
        let auth = Arc::new(Authenticator::from_config(&config, store.clone()).unwrap());
        let provider = Arc::new(IdentityProviderClient::new(&config.identity).unwrap());

        let state = Arc::new(AppState {
            users: UserService::new(Arc::clone(&auth), provider, config.auth.default_role.clone()),
            catalog: CatalogService::new(store.clone(), objects.clone()),
            auth,
            max_upload_size: config.server.max_upload_size,
            download_url_ttl: config.storage.download_url_ttl,
            request_timeout: config.server.request_timeout,
        });

        Self {
            router: create_router(state),
            idp,
            store,
            objects,
        }
    }

    /// Token for `sub` with the given realm roles.
    pub fn token(&self, sub: &str, realm_roles: &[&str]) -> String {
        mint(&self.idp.claims(sub, realm_roles))
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, body)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(authorized("GET", uri, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.send(authorized("DELETE", uri, token).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.json("POST", uri, token, body).await
    }

    pub async fn put_json(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.json("PUT", uri, Some(token), body).await
    }

    async fn json(&self, method: &str, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        let builder = match token {
            Some(token) => authorized(method, uri, token),
            None => Request::builder().method(method).uri(uri),
        };
        self.send(
            builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }
}

pub fn authorized(method: &str, uri: &str, token: &str) -> axum::http::request::Builder {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
}

pub const BOUNDARY: &str = "course-api-test-boundary";

/// `multipart/form-data` body with one file part.
pub fn multipart_file(field: &str, filename: &str, content_type: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}
