//! Authorization administration routes

use axum::{
    extract::Extension,
    middleware,
    routing::{get, post, put},
    Router,
};

use super::handlers;
use super::middleware::{
    require_policy_permission, require_role, RequiredPermission, RequiredRole,
};

/// Relational RBAC administration, gated on the `admin` role
///
/// # Routes
/// - `GET/POST /api/rbac/roles`, `PUT/DELETE /api/rbac/roles/:id`
/// - `GET/POST /api/rbac/permissions`, `PUT/DELETE /api/rbac/permissions/:id`
/// - `GET/POST/DELETE /api/rbac/users/:id/roles`
/// - `GET /api/rbac/roles/:id/permissions`
/// - `POST/DELETE /api/rbac/role-permissions`
/// - `GET /api/rbac/check` (self-check, no admin gate)
pub fn rbac_routes() -> Router {
    let admin = Router::new()
        .route(
            "/api/rbac/roles",
            get(handlers::list_roles).post(handlers::create_role),
        )
        .route(
            "/api/rbac/roles/:id",
            put(handlers::update_role).delete(handlers::delete_role),
        )
        .route(
            "/api/rbac/permissions",
            get(handlers::list_permissions).post(handlers::create_permission),
        )
        .route(
            "/api/rbac/permissions/:id",
            put(handlers::update_permission).delete(handlers::delete_permission),
        )
        .route(
            "/api/rbac/users/:id/roles",
            get(handlers::get_user_roles)
                .post(handlers::assign_role_to_user)
                .delete(handlers::remove_role_from_user),
        )
        .route(
            "/api/rbac/roles/:id/permissions",
            get(handlers::get_role_permissions),
        )
        .route("/api/rbac/roles/:id/users", get(handlers::get_role_users))
        .route(
            "/api/rbac/role-permissions",
            post(handlers::assign_permission_to_role)
                .delete(handlers::remove_permission_from_role),
        )
        .route_layer(middleware::from_fn(require_role))
        .route_layer(Extension(RequiredRole("admin")));

    Router::new()
        .merge(admin)
        .route("/api/rbac/check", get(handlers::check_permission))
}

/// Policy-engine administration, gated on the `admin` role, plus the
/// policy-guarded sample content route
pub fn policy_routes() -> Router {
    let admin = Router::new()
        .route(
            "/api/policy/policies",
            get(handlers::list_policies)
                .post(handlers::add_policy)
                .delete(handlers::remove_policy),
        )
        .route(
            "/api/policy/roles",
            post(handlers::add_subject_role).delete(handlers::remove_subject_role),
        )
        .route("/api/policy/users/:subject/roles", get(handlers::subject_roles))
        .route("/api/policy/roles/:role/users", get(handlers::role_subjects))
        .route_layer(middleware::from_fn(require_role))
        .route_layer(Extension(RequiredRole("admin")));

    let content = Router::new()
        .route("/api/content", get(handlers::content_index))
        .route_layer(middleware::from_fn(require_policy_permission))
        .route_layer(Extension(RequiredPermission {
            resource: "content",
            action: "read",
        }));

    Router::new()
        .merge(admin)
        .merge(content)
        .route("/api/policy/check", get(handlers::policy_check))
}
