//! Role and permission data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A permission names an allowed (resource, action) pair. Users never hold
/// permissions directly; checks always resolve through role membership.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct Permission {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub resource: String,
    pub action: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
pub struct RoleWithPermissions {
    pub role: Role,
    pub permissions: Vec<Permission>,
}

// ---- Request payloads ----

#[derive(Deserialize, Debug)]
pub struct RolePayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Deserialize, Debug)]
pub struct PermissionPayload {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub resource: String,
    pub action: String,
}

#[derive(Deserialize, Debug)]
pub struct UserRolePayload {
    pub role_name: String,
}

#[derive(Deserialize, Debug)]
pub struct RolePermissionPayload {
    pub role_name: String,
    pub permission_name: String,
}

#[derive(Deserialize, Debug)]
pub struct CheckQuery {
    pub resource: String,
    pub action: String,
}

/// A casbin policy tuple: role may perform action on resource
#[derive(Serialize, Deserialize, Debug)]
pub struct PolicyPayload {
    pub role: String,
    pub resource: String,
    pub action: String,
}

/// A casbin grouping tuple: subject is a member of role
#[derive(Deserialize, Debug)]
pub struct SubjectRolePayload {
    pub subject: String,
    pub role: String,
}
