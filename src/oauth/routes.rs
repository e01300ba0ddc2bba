//! Redirect-based login routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the provider login router
///
/// # Routes
/// - `GET /auth/:provider` - Start the provider login redirect
/// - `GET /auth/:provider/callback` - Provider redirect target
pub fn oauth_routes() -> Router {
    Router::new()
        .route("/auth/:provider", get(handlers::oauth_login))
        .route("/auth/:provider/callback", get(handlers::oauth_callback))
}
