// Error handling types for the API

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::fmt;
use tracing::error;

use crate::services::auth::AuthError;
use crate::services::oauth::OAuthError;
use crate::services::policy::PolicyError;
use crate::services::rbac::RbacError;
use crate::services::users::UserError;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Unauthorized(String),
    /// Expired access token. Kept separate from `Unauthorized` so clients
    /// can tell "re-login" apart from "refresh and retry".
    TokenExpired,
    Forbidden(String),
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServer(String),
    DatabaseError(sqlx::Error),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::TokenExpired => write!(f, "Unauthorized: token expired"),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServer(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::DatabaseError(e) => write!(f, "Database Error: {}", e),
        }
    }
}

/// JSON error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_message, code) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, "UNAUTHORIZED"),
            ApiError::TokenExpired => (
                StatusCode::UNAUTHORIZED,
                "token expired".to_string(),
                "TOKEN_EXPIRED",
            ),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "FORBIDDEN"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "BAD_REQUEST"),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "NOT_FOUND"),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, "CONFLICT"),
            ApiError::InternalServer(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg,
                "INTERNAL_SERVER_ERROR",
            ),
            ApiError::DatabaseError(e) => {
                error!(error = %e, "Database error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Database operation failed".to_string(),
                    "DATABASE_ERROR",
                )
            }
        };

        let error_response = ErrorResponse {
            error: error_message,
            code: code.to_string(),
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::InvalidCredentials => {
                ApiError::Unauthorized("invalid credentials".to_string())
            }
            AuthError::TokenInvalid => ApiError::Unauthorized("invalid token".to_string()),
            AuthError::TokenExpired => ApiError::TokenExpired,
            AuthError::RefreshTokenNotFound => {
                ApiError::Unauthorized("refresh token not found".to_string())
            }
            AuthError::RefreshTokenExpired => {
                ApiError::Unauthorized("refresh token expired".to_string())
            }
            AuthError::Storage(e) => ApiError::DatabaseError(e),
            AuthError::Signing(_) => ApiError::InternalServer("token signing failed".to_string()),
        }
    }
}

impl From<RbacError> for ApiError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::RoleNotFound(name) => {
                ApiError::NotFound(format!("role not found: {}", name))
            }
            RbacError::PermissionNotFound(name) => {
                ApiError::NotFound(format!("permission not found: {}", name))
            }
            RbacError::PermissionDenied { resource, action } => {
                ApiError::Forbidden(format!("permission denied: {}:{}", resource, action))
            }
            RbacError::Storage(e) => ApiError::DatabaseError(e),
        }
    }
}

impl From<PolicyError> for ApiError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::PermissionDenied { resource, action } => {
                ApiError::Forbidden(format!("permission denied: {}:{}", resource, action))
            }
            PolicyError::Engine(e) => {
                error!(error = %e, "Policy engine failure");
                ApiError::InternalServer("policy engine failure".to_string())
            }
            PolicyError::Storage(e) => ApiError::DatabaseError(e),
        }
    }
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::NotFound => ApiError::NotFound("user not found".to_string()),
            UserError::EmailTaken => ApiError::Conflict("email already registered".to_string()),
            UserError::Hashing => ApiError::InternalServer("password hashing failed".to_string()),
            UserError::Storage(e) => ApiError::DatabaseError(e),
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        match err {
            OAuthError::UnknownProvider(name) => {
                ApiError::NotFound(format!("provider not found: {}", name))
            }
            OAuthError::InvalidState => {
                ApiError::Unauthorized("state validation failed".to_string())
            }
            OAuthError::ExchangeFailed(msg) => {
                ApiError::InternalServer(format!("token exchange failed: {}", msg))
            }
            OAuthError::UserInfoFailed(msg) => {
                ApiError::InternalServer(format!("userinfo fetch failed: {}", msg))
            }
        }
    }
}
