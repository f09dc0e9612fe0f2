//! Login proxy and user profile handlers.

use std::sync::Arc;

use axum::extract::State;
use course_core::request::{
    AdminCreateUserRequest, ChangePasswordRequest, LoginRequest, RefreshRequest,
    UpdateUserRequest,
};
use serde_json::json;

use super::{ApiResult, AppState, JsonBody, created, done, ok};
use crate::auth::AuthContext;

pub(super) async fn login(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult {
    let tokens = state.users.login(&req).await?;
    ok(tokens, "Login successful")
}

pub(super) async fn refresh(
    State(state): State<Arc<AppState>>,
    JsonBody(req): JsonBody<RefreshRequest>,
) -> ApiResult {
    let tokens = state.users.refresh(&req).await?;
    ok(tokens, "Token refreshed")
}

/// Bootstrap: create the caller's local user on first use.
pub(super) async fn claim(State(state): State<Arc<AppState>>, ctx: AuthContext) -> ApiResult {
    let user = state.users.claim(&ctx).await?;
    created(user, "Authorized successfully")
}

pub(super) async fn me(State(state): State<Arc<AppState>>, ctx: AuthContext) -> ApiResult {
    let user = state.users.me(&ctx).await?;
    let roles: Vec<&str> = user.role_names().collect();
    ok(
        json!({
            "user": user,
            "roles": roles,
            "token_roles": ctx.claims.realm_roles(),
        }),
        "User retrieved successfully",
    )
}

pub(super) async fn update(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    JsonBody(req): JsonBody<UpdateUserRequest>,
) -> ApiResult {
    let user = state.users.update_profile(&ctx, &req).await?;
    ok(user, "User updated successfully")
}

pub(super) async fn change_password(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    JsonBody(req): JsonBody<ChangePasswordRequest>,
) -> ApiResult {
    state.users.change_password(&ctx, &req).await?;
    done("Password changed successfully")
}

pub(super) async fn admin_create(
    State(state): State<Arc<AppState>>,
    ctx: AuthContext,
    JsonBody(req): JsonBody<AdminCreateUserRequest>,
) -> ApiResult {
    let user = state.users.admin_create(&ctx, &req).await?;
    created(user, "User created successfully")
}
