//! Redirect-based login flow handlers

use axum::{
    extract::{Extension, Path, Query},
    http::header::SET_COOKIE,
    response::{AppendHeaders, IntoResponse, Redirect},
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::auth::handlers::access_cookie;
use crate::common::{safe_email_log, ApiError, AppState};
use crate::services::oauth::OAuthError;

/// GET /auth/:provider
/// Start a redirect-based login: mint a CSRF state token and send the
/// browser to the provider's authorize URL
pub async fn oauth_login(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider_name): Path<String>,
) -> Result<Redirect, ApiError> {
    let state = state_lock.read().await.clone();

    let provider = state
        .oauth
        .get(&provider_name)
        .ok_or_else(|| OAuthError::UnknownProvider(provider_name.clone()))?;

    let csrf_state = state.state_tokens.generate().await;
    let auth_url = provider.authorization_url(&csrf_state);

    info!(provider = %provider_name, "Starting provider login redirect");
    Ok(Redirect::temporary(&auth_url))
}

/// GET /auth/:provider/callback
/// Handle the provider redirect: consume the state token, exchange the
/// code, normalize the identity, get-or-create the user and start a
/// session
pub async fn oauth_callback(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(provider_name): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if let Some(error) = params.get("error") {
        warn!(provider = %provider_name, oauth_error = %error, "Provider returned error");
        return Err(ApiError::BadRequest(format!(
            "provider returned error: {}",
            error
        )));
    }

    let code = params
        .get("code")
        .filter(|c| !c.is_empty())
        .ok_or_else(|| ApiError::BadRequest("authorization code is required".to_string()))?;
    let csrf_state = params
        .get("state")
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::BadRequest("state parameter is required".to_string()))?;

    // Single-use: a replayed or forged state fails here
    if !state.state_tokens.validate(csrf_state).await {
        return Err(OAuthError::InvalidState.into());
    }

    let provider = state
        .oauth
        .get(&provider_name)
        .ok_or_else(|| OAuthError::UnknownProvider(provider_name.clone()))?;

    let provider_token = provider.exchange_code(code).await?;
    let oauth_user = provider.fetch_user(&provider_token.access_token).await?;

    let user = state.users.get_or_create_oauth(&oauth_user).await?;
    let pair = state.refresh_tokens.create(&user, "", "").await?;

    info!(
        user_id = user.id,
        email = %safe_email_log(&user.email),
        provider = %provider_name,
        "Provider login successful"
    );

    let cookies = AppendHeaders([(
        SET_COOKIE,
        access_cookie(&pair.access_token, pair.expires_in),
    )]);
    Ok((cookies, Redirect::temporary("/api/auth/protected")))
}
