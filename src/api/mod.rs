//! HTTP router and handlers.
//!
//! # Endpoints
//!
//! | Method | Path | Auth |
//! |--------|------|------|
//! | `GET` | `/`, `/health` | public |
//! | `POST` | `/api/v1/auth/login`, `/api/v1/auth/refresh` | public |
//! | `POST` | `/api/v1/users/login` | token (no local user yet) |
//! | `GET` | `/api/v1/users/me` | token |
//! | `PUT` | `/api/v1/users/update`, `/api/v1/users/change-password` | token |
//! | `POST` | `/api/v1/users/admin/create` | role `admin` |
//! | `*` | `/api/v1/courses/...` | token |
//! | `POST`/`DELETE` | `.../lessons/{id}/attachments[/{id}]` | role `admin` or `teacher` |
//!
//! Every response body is an [`Envelope`].

mod attachments;
mod courses;
mod users;

use std::{sync::Arc, time::Duration};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, FromRequest, Request},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use course_core::{Envelope, Id};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    auth::{Authenticator, authenticate, require_any_role, require_role, role_gate},
    service::{CatalogService, ServiceError, UserService},
};

/// Roles allowed to upload and delete attachments.
pub const ATTACHMENT_EDITORS: &[&str] = &["admin", "teacher"];

/// Shared application state.
pub struct AppState {
    /// Authentication pipeline
    pub auth: Arc<Authenticator>,
    /// User operations
    pub users: UserService,
    /// Catalogue and attachment operations
    pub catalog: CatalogService,
    /// Largest accepted upload, in bytes
    pub max_upload_size: usize,
    /// Lifetime of attachment download links
    pub download_url_ttl: Duration,
    /// Per-request timeout
    pub request_timeout: Duration,
}

/// Build the full router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let auth = Arc::clone(&state.auth);
    let admin_only = require_role(&auth.roles, "admin");
    let editors = require_any_role(&auth.roles, ATTACHMENT_EDITORS);

    let lesson = "/api/v1/courses/{course_id}/chapters/{chapter_id}/lessons/{lesson_id}";

    let protected = Router::new()
        .route("/api/v1/users/login", post(users::claim))
        .route("/api/v1/users/me", get(users::me))
        .route("/api/v1/users/update", put(users::update))
        .route("/api/v1/users/change-password", put(users::change_password))
        .route(
            "/api/v1/users/admin/create",
            post(users::admin_create).route_layer(from_fn_with_state(admin_only, role_gate)),
        )
        .route(
            "/api/v1/courses",
            get(courses::list_courses).post(courses::create_course),
        )
        .route(
            "/api/v1/courses/{course_id}",
            get(courses::get_course)
                .put(courses::update_course)
                .delete(courses::delete_course),
        )
        .route(
            "/api/v1/courses/{course_id}/chapters",
            get(courses::list_chapters).post(courses::create_chapter),
        )
        .route(
            "/api/v1/courses/{course_id}/chapters/{chapter_id}",
            get(courses::get_chapter)
                .put(courses::update_chapter)
                .delete(courses::delete_chapter),
        )
        .route(
            "/api/v1/courses/{course_id}/chapters/{chapter_id}/lessons",
            get(courses::list_lessons).post(courses::create_lesson),
        )
        .route(
            lesson,
            get(courses::get_lesson)
                .put(courses::update_lesson)
                .delete(courses::delete_lesson),
        )
        .route(
            &format!("{lesson}/attachments"),
            get(attachments::list).merge(
                post(attachments::upload)
                    .route_layer(from_fn_with_state(editors.clone(), role_gate)),
            ),
        )
        .route(
            &format!("{lesson}/attachments/{{attachment_id}}"),
            get(attachments::get).merge(
                axum::routing::delete(attachments::delete)
                    .route_layer(from_fn_with_state(editors, role_gate)),
            ),
        )
        .route(
            &format!("{lesson}/attachments/{{attachment_id}}/content"),
            get(attachments::content),
        )
        .route_layer(from_fn_with_state(auth, authenticate));

    let public = Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/api/v1/auth/login", post(users::login))
        .route("/api/v1/auth/refresh", post(users::refresh));

    let body_limit = state.max_upload_size.saturating_add(64 * 1024);
    let timeout = state.request_timeout;

    public
        .merge(protected)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

async fn root_handler() -> impl IntoResponse {
    Json(Envelope::message("Hello from the course API"))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Handler result.
pub type ApiResult = Result<Response, ServiceError>;

/// 200 with `data`.
fn ok<T: Serialize>(data: T, message: &str) -> ApiResult {
    Ok((StatusCode::OK, Json(Envelope::success(data, message))).into_response())
}

/// 201 with `data`.
fn created<T: Serialize>(data: T, message: &str) -> ApiResult {
    Ok((StatusCode::CREATED, Json(Envelope::success(data, message))).into_response())
}

/// 200 without payload.
fn done(message: &str) -> ApiResult {
    Ok((StatusCode::OK, Json(Envelope::message(message))).into_response())
}

/// Parse a numeric path id, rejecting it as `Invalid {entity} ID`.
fn parse_id(raw: &str, entity: &str) -> Result<Id, ServiceError> {
    raw.parse()
        .map_err(|_| ServiceError::Validation(format!("Invalid {entity} ID")))
}

/// JSON body whose rejections render as a 400 envelope.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        Json::<T>::from_request(req, state)
            .await
            .map(|Json(value)| Self(value))
            .map_err(|e| ServiceError::Validation(format!("Invalid request body: {}", e.body_text())))
    }
}
