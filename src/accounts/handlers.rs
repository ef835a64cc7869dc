use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use tracing::instrument;

use crate::{
    accounts::dto::{
        BulkUsersRequest, LoginRequest, LoginResponse, MessageResponse, SignupRequest,
        SignupResponse, UserSummary,
    },
    error::ApiError,
    state::AppState,
};

pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/users", get(list_users))
}

/// Privileged bulk operations; each one passes the blocked-actor guard first.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/delete-users", delete(delete_users))
        .route("/block-users", put(block_users))
        .route("/unblock-users", put(unblock_users))
}

#[instrument(skip(state, payload))]
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SignupResponse>, ApiError> {
    let Json(payload) = payload?;
    let user_id = state
        .directory
        .register(&payload.name, &payload.email, &payload.password)
        .await?;
    Ok(Json(SignupResponse {
        message: "User registered successfully!",
        user_id,
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(payload) = payload?;
    let user = state
        .directory
        .authenticate(&payload.email, &payload.password)
        .await?;
    Ok(Json(LoginResponse {
        message: "Login successful!",
        user_id: user.id,
        name: user.name,
    }))
}

#[instrument(skip(state))]
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserSummary>>, ApiError> {
    let users = state.directory.list_users().await?;
    Ok(Json(users.into_iter().map(UserSummary::from).collect()))
}

#[instrument(skip(state, payload))]
pub async fn delete_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkUsersRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;
    let targets = payload.user_ids.unwrap_or_default();
    state.directory.delete_users(payload.user_id, &targets).await?;
    Ok(Json(MessageResponse {
        message: "Users deleted successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn block_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkUsersRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;
    let targets = payload.user_ids.unwrap_or_default();
    state
        .directory
        .set_blocked_state(payload.user_id, &targets, true)
        .await?;
    Ok(Json(MessageResponse {
        message: "Users blocked successfully",
    }))
}

#[instrument(skip(state, payload))]
pub async fn unblock_users(
    State(state): State<AppState>,
    payload: Result<Json<BulkUsersRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, ApiError> {
    let Json(payload) = payload?;
    let targets = payload.user_ids.unwrap_or_default();
    state
        .directory
        .set_blocked_state(payload.user_id, &targets, false)
        .await?;
    Ok(Json(MessageResponse {
        message: "Users unblocked successfully",
    }))
}
