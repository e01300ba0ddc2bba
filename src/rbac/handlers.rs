//! Role, permission and policy administration handlers.
//!
//! Grant mutations are the single write path for both authorization
//! representations: every handler that touches a relational edge also
//! writes the equivalent casbin tuple, using the resolved resource and
//! action columns rather than anything inferred from names.

use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::models::{
    CheckQuery, PermissionPayload, PolicyPayload, RolePayload, RolePermissionPayload,
    RoleWithPermissions, SubjectRolePayload, UserRolePayload,
};
use crate::auth::AuthedUser;
use crate::common::{ApiError, AppState};

// ---- Roles ----

/// GET /api/rbac/roles
pub async fn list_roles(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let roles = state.rbac.get_roles().await?;
    Ok(Json(roles))
}

/// POST /api/rbac/roles
pub async fn create_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.name.is_empty() {
        return Err(ApiError::BadRequest("role name is required".to_string()));
    }
    if state.rbac.get_role_by_name(&payload.name).await?.is_some() {
        return Err(ApiError::Conflict("role already exists".to_string()));
    }

    let role = state
        .rbac
        .create_role(&payload.name, &payload.description)
        .await?;
    Ok((StatusCode::CREATED, Json(role)))
}

/// PUT /api/rbac/roles/:id
pub async fn update_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
    Json(payload): Json<RolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let role = state
        .rbac
        .update_role(id, &payload.name, &payload.description)
        .await?;
    Ok(Json(role))
}

/// DELETE /api/rbac/roles/:id
/// Removes the role, its grant edges, and every policy tuple naming it
pub async fn delete_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let role = state
        .rbac
        .get_role_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("role not found: {}", id)))?;

    state.rbac.delete_role(id).await?;
    state.policy.remove_role_tuples(&role.name).await?;

    Ok(Json(serde_json::json!({ "message": "Role deleted successfully" })))
}

// ---- Permissions ----

/// GET /api/rbac/permissions
pub async fn list_permissions(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let permissions = state.rbac.get_permissions().await?;
    Ok(Json(permissions))
}

/// POST /api/rbac/permissions
pub async fn create_permission(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<PermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    if payload.name.is_empty() || payload.resource.is_empty() || payload.action.is_empty() {
        return Err(ApiError::BadRequest(
            "permission name, resource and action are required".to_string(),
        ));
    }
    if state
        .rbac
        .get_permission_by_name(&payload.name)
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("permission already exists".to_string()));
    }

    let permission = state
        .rbac
        .create_permission(
            &payload.name,
            &payload.description,
            &payload.resource,
            &payload.action,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(permission)))
}

/// PUT /api/rbac/permissions/:id
pub async fn update_permission(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
    Json(payload): Json<PermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let permission = state
        .rbac
        .update_permission(
            id,
            &payload.name,
            &payload.description,
            &payload.resource,
            &payload.action,
        )
        .await?;
    Ok(Json(permission))
}

/// DELETE /api/rbac/permissions/:id
/// Removes the permission, its grant edges, and matching policy tuples
pub async fn delete_permission(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let permission = state
        .rbac
        .get_permission_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("permission not found: {}", id)))?;

    state.rbac.delete_permission(id).await?;
    state
        .policy
        .remove_policies_for_permission(&permission.resource, &permission.action)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Permission deleted successfully" })))
}

/// GET /api/rbac/roles/:id/users
pub async fn get_role_users(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(role_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    state
        .rbac
        .get_role_by_id(role_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("role not found: {}", role_id)))?;
    let users = state.rbac.get_users_by_role(role_id).await?;

    Ok(Json(users))
}

// ---- User-role grants ----

/// GET /api/rbac/users/:id/roles
pub async fn get_user_roles(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let roles = state.rbac.get_user_roles(user_id).await?;
    Ok(Json(roles))
}

/// POST /api/rbac/users/:id/roles
/// Writes the relational edge and the grouping tuple together
pub async fn assign_role_to_user(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UserRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let role = state
        .rbac
        .assign_role_to_user(user_id, &payload.role_name)
        .await?;
    state
        .policy
        .add_role_for_subject(&user_id.to_string(), &role.name)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Role assigned successfully" })))
}

/// DELETE /api/rbac/users/:id/roles
pub async fn remove_role_from_user(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(user_id): Path<i64>,
    Json(payload): Json<UserRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let role = state
        .rbac
        .remove_role_from_user(user_id, &payload.role_name)
        .await?;
    state
        .policy
        .remove_role_for_subject(&user_id.to_string(), &role.name)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Role removed successfully" })))
}

// ---- Role-permission grants ----

/// GET /api/rbac/roles/:id/permissions
pub async fn get_role_permissions(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(role_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let role = state
        .rbac
        .get_role_by_id(role_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("role not found: {}", role_id)))?;
    let permissions = state.rbac.get_role_permissions(role_id).await?;

    Ok(Json(RoleWithPermissions { role, permissions }))
}

/// POST /api/rbac/role-permissions
/// Writes the relational edge and the policy tuple together, taking the
/// resource/action from the resolved permission row
pub async fn assign_permission_to_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RolePermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let (role, permission) = state
        .rbac
        .assign_permission_to_role(&payload.role_name, &payload.permission_name)
        .await?;
    state
        .policy
        .add_policy(&role.name, &permission.resource, &permission.action)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Permission granted successfully" })))
}

/// DELETE /api/rbac/role-permissions
pub async fn remove_permission_from_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<RolePermissionPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();

    let (role, permission) = state
        .rbac
        .remove_permission_from_role(&payload.role_name, &payload.permission_name)
        .await?;
    state
        .policy
        .remove_policy(&role.name, &permission.resource, &permission.action)
        .await?;

    Ok(Json(serde_json::json!({ "message": "Permission revoked successfully" })))
}

// ---- Checks ----

/// GET /api/rbac/check?resource=&action=
/// Self-check for the authenticated user through the relational engine
pub async fn check_permission(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Query(query): Query<CheckQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let allowed = state
        .rbac
        .has_permission(authed.id, &query.resource, &query.action)
        .await?;
    Ok(Json(serde_json::json!({
        "resource": query.resource,
        "action": query.action,
        "allowed": allowed,
    })))
}

// ---- Policy engine administration ----

/// GET /api/policy/policies
pub async fn list_policies(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let policies: Vec<PolicyPayload> = state
        .policy
        .policies()
        .await
        .into_iter()
        .filter(|tuple| tuple.len() == 3)
        .map(|tuple| PolicyPayload {
            role: tuple[0].clone(),
            resource: tuple[1].clone(),
            action: tuple[2].clone(),
        })
        .collect();
    Ok(Json(policies))
}

/// POST /api/policy/policies
pub async fn add_policy(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<PolicyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let added = state
        .policy
        .add_policy(&payload.role, &payload.resource, &payload.action)
        .await?;
    Ok(Json(serde_json::json!({ "added": added })))
}

/// DELETE /api/policy/policies
pub async fn remove_policy(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<PolicyPayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let removed = state
        .policy
        .remove_policy(&payload.role, &payload.resource, &payload.action)
        .await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// POST /api/policy/roles
pub async fn add_subject_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<SubjectRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let added = state
        .policy
        .add_role_for_subject(&payload.subject, &payload.role)
        .await?;
    Ok(Json(serde_json::json!({ "added": added })))
}

/// DELETE /api/policy/roles
pub async fn remove_subject_role(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Json(payload): Json<SubjectRolePayload>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let removed = state
        .policy
        .remove_role_for_subject(&payload.subject, &payload.role)
        .await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}

/// GET /api/policy/users/:subject/roles
pub async fn subject_roles(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(subject): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let roles = state.policy.roles_for_subject(&subject).await;
    Ok(Json(roles))
}

/// GET /api/policy/roles/:role/users
pub async fn role_subjects(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    Path(role): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let subjects = state.policy.subjects_for_role(&role).await;
    Ok(Json(subjects))
}

/// GET /api/policy/check?resource=&action=
/// Self-check for the authenticated user through the policy engine
pub async fn policy_check(
    Extension(state_lock): Extension<Arc<RwLock<AppState>>>,
    authed: AuthedUser,
    Query(query): Query<CheckQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let state = state_lock.read().await.clone();
    let allowed = state
        .policy
        .enforce(&authed.id.to_string(), &query.resource, &query.action)
        .await?;
    Ok(Json(serde_json::json!({
        "resource": query.resource,
        "action": query.action,
        "allowed": allowed,
    })))
}

// ---- Guarded sample content ----

/// GET /api/content
/// Sample resource sitting behind the policy-engine guard
pub async fn content_index(authed: AuthedUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "message": "Content access granted",
        "user_id": authed.id,
        "items": ["first post", "second post"],
    }))
}
