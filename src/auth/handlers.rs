//! Authentication handlers

use axum::{
    extract::{Extension, Json},
    http::{header::SET_COOKIE, HeaderMap},
    response::{AppendHeaders, IntoResponse},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::extractors::{cookie_value, AuthedUser};
use super::models::{AuthRequest, RefreshTokenRequest, TokenPair};
use crate::common::{safe_email_log, ApiError, AppState};

/// Cookie carrying the access token, sent on every path
pub(crate) fn access_cookie(token: &str, max_age: i64) -> String {
    format!(
        "token={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        token, max_age
    )
}

/// Cookie carrying the refresh secret, scoped to the refresh endpoint only
pub(crate) fn refresh_cookie(secret: &str, max_age: i64) -> String {
    format!(
        "refresh_token={}; Path=/api/auth/refresh; Max-Age={}; HttpOnly; SameSite=Strict",
        secret, max_age
    )
}

fn clear_cookie(name: &str, path: &str) -> String {
    format!("{}=; Path={}; Max-Age=0; HttpOnly", name, path)
}

fn token_pair_cookies(pair: &TokenPair, refresh_max_age: i64) -> AppendHeaders<[(axum::http::HeaderName, String); 2]> {
    AppendHeaders([
        (SET_COOKIE, access_cookie(&pair.access_token, pair.expires_in)),
        (SET_COOKIE, refresh_cookie(&pair.refresh_token, refresh_max_age)),
    ])
}

/// POST /api/auth/login
/// Validates credentials and issues an access/refresh token pair
///
/// # Request Body
/// ```json
/// {
///   "email": "alice@example.com",
///   "password": "secret"
/// }
/// ```
///
/// # Response
/// ```json
/// {
///   "token": "<jwt>",
///   "refresh_token": "<opaque secret>",
///   "expires_in": 900,
///   "user": { ... }
/// }
/// ```
pub async fn login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
    Json(payload): Json<AuthRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::BadRequest(
            "email and password are required".to_string(),
        ));
    }

    info!(email = %safe_email_log(&payload.email), "Received login request");

    let device_info = headers
        .get("user-agent")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    let ip_address = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .unwrap_or("")
        .trim();

    let (pair, user) = state
        .auth
        .login(&payload.email, &payload.password, device_info, ip_address)
        .await?;

    let cookies = token_pair_cookies(&pair, state.refresh_tokens.refresh_ttl().num_seconds());
    let body = serde_json::json!({
        "token": pair.access_token,
        "refresh_token": pair.refresh_token,
        "expires_in": pair.expires_in,
        "user": user,
    });

    Ok((cookies, Json(body)))
}

/// POST /api/auth/refresh
/// Exchanges a refresh secret for a fresh access token. The secret is
/// taken from the request body when present, otherwise from the
/// `refresh_token` cookie.
pub async fn refresh(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    headers: HeaderMap,
    payload: Option<Json<RefreshTokenRequest>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let secret = payload
        .map(|Json(req)| req.refresh_token)
        .filter(|s| !s.is_empty())
        .or_else(|| cookie_value(&headers, "refresh_token"));

    let Some(secret) = secret else {
        warn!("Refresh request without a refresh token");
        return Err(ApiError::Unauthorized("refresh token not found".to_string()));
    };

    let pair = state.auth.refresh(&secret).await?;

    let cookies = token_pair_cookies(&pair, state.refresh_tokens.refresh_ttl().num_seconds());
    Ok((cookies, Json(pair)))
}

/// POST /api/auth/logout
/// Revokes the user's refresh tokens (best effort) and clears both
/// token cookies. Always succeeds from the caller's perspective.
pub async fn logout(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    state.auth.logout(authed.id).await;

    let cookies = AppendHeaders([
        (SET_COOKIE, clear_cookie("token", "/")),
        (SET_COOKIE, clear_cookie("refresh_token", "/api/auth/refresh")),
    ]);
    let body = serde_json::json!({ "message": "Logged out successfully" });

    Ok((cookies, Json(body)))
}

/// GET /api/auth/protected
/// Sample protected endpoint returning the identity attached by the
/// authorization middleware
pub async fn protected(authed: AuthedUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Protected resource accessed successfully",
        "user_id": authed.id,
        "email": authed.email,
    }))
}
