//! Authentication extractors for Axum
//!
//! `AuthedUser` is the request authorization middleware: it pulls a bearer
//! credential out of the request (Authorization header first, `token`
//! cookie as fallback), validates it through the session service, and
//! attaches the resolved identity to the request scope. Downstream guards
//! and handlers only ever learn "who" from this attachment.

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::{
        header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE},
        request::Parts,
        HeaderMap, StatusCode,
    },
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::common::{safe_email_log, safe_token_log, ApiError, AppState};
use crate::services::auth::AuthError;

/// Identity resolved from a validated access token
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub id: i64,
    pub email: String,
}

/// Rejection for failed request authorization.
///
/// API callers get a structured error payload; browser-style callers get
/// their stored token cleared and a redirect to the login entry point.
#[derive(Debug)]
pub enum AuthRejection {
    Api(ApiError),
    Redirect { location: &'static str },
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            AuthRejection::Api(err) => err.into_response(),
            AuthRejection::Redirect { location } => (
                StatusCode::TEMPORARY_REDIRECT,
                [
                    (LOCATION, location.to_string()),
                    // Drop the stale credential on the client
                    (SET_COOKIE, "token=; Path=/; Max-Age=0; HttpOnly".to_string()),
                ],
            )
                .into_response(),
        }
    }
}

/// Read a single cookie value out of a Cookie header
pub(crate) fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    let raw = headers.get(COOKIE)?.to_str().ok()?;
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.to_string())
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // A guard layer may already have attached the identity
        if let Some(authed) = parts.extensions.get::<AuthedUser>() {
            return Ok(authed.clone());
        }

        let is_api = parts.uri.path().starts_with("/api/");

        let Extension(state_lock): Extension<Arc<RwLock<AppState>>> =
            Extension::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthRejection::Api(ApiError::InternalServer("missing app state".to_string()))
                })?;

        let app_state = state_lock.read().await.clone();

        // Bearer header first, named cookie as fallback
        let header_token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .map(|raw| match raw.strip_prefix("Bearer ") {
                Some(rest) => rest.to_string(),
                None => raw.to_string(),
            });

        let token = match header_token.or_else(|| cookie_value(&parts.headers, "token")) {
            Some(t) => t,
            None => {
                warn!(path = %parts.uri.path(), "Authentication failed: no token presented");
                return Err(if is_api {
                    AuthRejection::Api(ApiError::Unauthorized("missing token".to_string()))
                } else {
                    AuthRejection::Redirect { location: "/login" }
                });
            }
        };

        let claims = match app_state.auth.validate_access_token(&token) {
            Ok(claims) => claims,
            Err(AuthError::TokenExpired) => {
                warn!(path = %parts.uri.path(), "Authentication failed: token expired");
                return Err(if is_api {
                    AuthRejection::Api(ApiError::TokenExpired)
                } else {
                    AuthRejection::Redirect {
                        location: "/login?error=token_expired",
                    }
                });
            }
            Err(e) => {
                warn!(
                    path = %parts.uri.path(),
                    token = %safe_token_log(&token),
                    error = %e,
                    "Authentication failed: invalid token"
                );
                return Err(if is_api {
                    AuthRejection::Api(ApiError::Unauthorized("invalid token".to_string()))
                } else {
                    AuthRejection::Redirect { location: "/login" }
                });
            }
        };

        let authed = AuthedUser {
            id: claims.user_id,
            email: claims.email,
        };

        debug!(
            user_id = authed.id,
            email = %safe_email_log(&authed.email),
            "Request authenticated"
        );

        // Attach the identity for downstream extractors on this request
        parts.extensions.insert(authed.clone());

        Ok(authed)
    }
}
