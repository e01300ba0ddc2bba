//! Authentication routes

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `POST /api/auth/login` - Credential login, returns a token pair
/// - `POST /api/auth/refresh` - Rotate the access token on a refresh secret
/// - `POST /api/auth/logout` - Revoke refresh tokens and clear cookies
/// - `GET /api/auth/protected` - Sample endpoint behind the auth middleware
pub fn auth_routes() -> Router {
    Router::new()
        .route("/api/auth/login", post(handlers::login))
        .route("/api/auth/refresh", post(handlers::refresh))
        .route("/api/auth/logout", post(handlers::logout))
        .route("/api/auth/protected", get(handlers::protected))
}
