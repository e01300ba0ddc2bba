//! User management routes

use axum::{
    extract::Extension,
    middleware,
    routing::{get, post},
    Router,
};

use super::handlers;
use crate::rbac::middleware::{require_role, RequiredRole};

/// Creates and returns the user management router
///
/// # Routes
/// - `POST /api/users` - Public registration
/// - `GET /api/users` - List users (admin)
/// - `GET/PUT/DELETE /api/users/:id` - User CRUD (admin)
pub fn users_routes() -> Router {
    let admin = Router::new()
        .route("/api/users", get(handlers::list_users))
        .route(
            "/api/users/:id",
            get(handlers::get_user)
                .put(handlers::update_user)
                .delete(handlers::delete_user),
        )
        .route_layer(middleware::from_fn(require_role))
        .route_layer(Extension(RequiredRole("admin")));

    Router::new()
        .route("/api/users", post(handlers::register))
        .merge(admin)
}
