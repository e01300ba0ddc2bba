//! User management handlers

use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use super::models::{RegisterPayload, UpdateUserPayload};
use crate::common::{safe_email_log, ApiError, AppState};
use crate::services::users::UserError;

/// POST /api/users
/// Register a local account. The password is stored as a salted argon2
/// hash; the response never carries hash material.
pub async fn register(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    info!(email = %safe_email_log(&payload.email), "Received registration request");

    let user = state
        .users
        .create(&payload.name, &payload.email, &payload.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/users
pub async fn list_users(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let users = state.users.list().await?;
    Ok(Json(users))
}

/// GET /api/users/:id
pub async fn get_user(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let user = state.users.get_by_id(id).await?.ok_or(UserError::NotFound)?;
    Ok(Json(user))
}

/// PUT /api/users/:id
pub async fn update_user(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateUserPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.email.is_empty() {
        return Err(ApiError::BadRequest("email is required".to_string()));
    }

    let user = state.users.update(id, &payload.name, &payload.email).await?;
    Ok(Json(user))
}

/// DELETE /api/users/:id
pub async fn delete_user(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    state.users.delete(id).await?;
    Ok(Json(serde_json::json!({ "message": "User deleted successfully" })))
}
