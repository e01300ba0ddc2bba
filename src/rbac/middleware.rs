//! Authorization guards layered onto protected route groups.
//!
//! Each guard runs after the authentication extractor and consults one of
//! the two authorization engines with the identity attached to the
//! request. The checked resource/action (or role) is declared per route
//! group via an extension, keeping a single write path from route table
//! to check.

use axum::{
    extract::{Extension, Request},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

/// Resource/action pair a route group requires
#[derive(Clone, Copy, Debug)]
pub struct RequiredPermission {
    pub resource: &'static str,
    pub action: &'static str,
}

/// Role a route group requires
#[derive(Clone, Copy, Debug)]
pub struct RequiredRole(pub &'static str);

/// Enforce a permission through the relational engine
pub async fn require_permission(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Extension(required): Extension<RequiredPermission>,
    authed: AuthedUser,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    state
        .rbac
        .check_permission(authed.id, required.resource, required.action)
        .await?;

    req.extensions_mut().insert(authed);
    Ok(next.run(req).await)
}

/// Enforce role membership through the relational engine
pub async fn require_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Extension(RequiredRole(role)): Extension<RequiredRole>,
    authed: AuthedUser,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    if !state.rbac.has_role(authed.id, role).await? {
        warn!(user_id = authed.id, role, "Role check rejected request");
        return Err(ApiError::Forbidden(format!("role required: {}", role)));
    }

    req.extensions_mut().insert(authed);
    Ok(next.run(req).await)
}

/// Enforce a permission through the policy engine
pub async fn require_policy_permission(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Extension(required): Extension<RequiredPermission>,
    authed: AuthedUser,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let state = state_lock.read().await.clone();

    state
        .policy
        .check_permission(&authed.id.to_string(), required.resource, required.action)
        .await?;

    req.extensions_mut().insert(authed);
    Ok(next.run(req).await)
}
