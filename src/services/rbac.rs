// src/services/rbac.rs
//! Relational authorization engine.
//!
//! Permission checks resolve user -> roles -> permissions through the join
//! tables and match on (resource, action). A user simply lacking the
//! permission is a `false` result; only backend failures surface as errors.

use chrono::Utc;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::models::User;
use crate::rbac::models::{Permission, Role};

#[derive(Debug, Error)]
pub enum RbacError {
    #[error("role not found: {0}")]
    RoleNotFound(String),

    #[error("permission not found: {0}")]
    PermissionNotFound(String),

    #[error("permission denied: {resource}:{action}")]
    PermissionDenied { resource: String, action: String },

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct RbacService {
    db: SqlitePool,
}

impl RbacService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    // ---- Roles ----

    pub async fn get_roles(&self) -> Result<Vec<Role>, RbacError> {
        let roles = sqlx::query_as("SELECT * FROM roles ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(roles)
    }

    pub async fn get_role_by_id(&self, id: i64) -> Result<Option<Role>, RbacError> {
        let role = sqlx::query_as("SELECT * FROM roles WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(role)
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, RbacError> {
        let role = sqlx::query_as("SELECT * FROM roles WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        Ok(role)
    }

    pub async fn create_role(&self, name: &str, description: &str) -> Result<Role, RbacError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO roles (name, description, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!(role = name, "Created role");
        let role = sqlx::query_as("SELECT * FROM roles WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.db)
            .await?;
        Ok(role)
    }

    pub async fn update_role(
        &self,
        id: i64,
        name: &str,
        description: &str,
    ) -> Result<Role, RbacError> {
        let result =
            sqlx::query("UPDATE roles SET name = ?, description = ?, updated_at = ? WHERE id = ?")
                .bind(name)
                .bind(description)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.db)
                .await?;

        if result.rows_affected() == 0 {
            return Err(RbacError::RoleNotFound(id.to_string()));
        }
        self.get_role_by_id(id)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound(id.to_string()))
    }

    pub async fn delete_role(&self, id: i64) -> Result<(), RbacError> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM user_roles WHERE role_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM role_permissions WHERE role_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- Permissions ----

    pub async fn get_permissions(&self) -> Result<Vec<Permission>, RbacError> {
        let permissions = sqlx::query_as("SELECT * FROM permissions ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(permissions)
    }

    pub async fn get_permission_by_id(&self, id: i64) -> Result<Option<Permission>, RbacError> {
        let permission = sqlx::query_as("SELECT * FROM permissions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(permission)
    }

    pub async fn get_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Permission>, RbacError> {
        let permission = sqlx::query_as("SELECT * FROM permissions WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.db)
            .await?;
        Ok(permission)
    }

    pub async fn create_permission(
        &self,
        name: &str,
        description: &str,
        resource: &str,
        action: &str,
    ) -> Result<Permission, RbacError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO permissions (name, description, resource, action, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(name)
        .bind(description)
        .bind(resource)
        .bind(action)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        info!(permission = name, resource, action, "Created permission");
        let permission = sqlx::query_as("SELECT * FROM permissions WHERE id = ?")
            .bind(result.last_insert_rowid())
            .fetch_one(&self.db)
            .await?;
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        id: i64,
        name: &str,
        description: &str,
        resource: &str,
        action: &str,
    ) -> Result<Permission, RbacError> {
        let result = sqlx::query(
            "UPDATE permissions SET name = ?, description = ?, resource = ?, action = ?, updated_at = ? WHERE id = ?",
        )
        .bind(name)
        .bind(description)
        .bind(resource)
        .bind(action)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RbacError::PermissionNotFound(id.to_string()));
        }
        self.get_permission_by_id(id)
            .await?
            .ok_or_else(|| RbacError::PermissionNotFound(id.to_string()))
    }

    pub async fn delete_permission(&self, id: i64) -> Result<(), RbacError> {
        let mut tx = self.db.begin().await?;
        sqlx::query("DELETE FROM role_permissions WHERE permission_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM permissions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    // ---- User-role edges ----

    pub async fn get_user_roles(&self, user_id: i64) -> Result<Vec<Role>, RbacError> {
        let roles = sqlx::query_as(
            r#"
            SELECT r.* FROM roles r
            JOIN user_roles ur ON r.id = ur.role_id
            WHERE ur.user_id = ?
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(roles)
    }

    pub async fn get_users_by_role(&self, role_id: i64) -> Result<Vec<User>, RbacError> {
        let users = sqlx::query_as(
            r#"
            SELECT u.* FROM users u
            JOIN user_roles ur ON u.id = ur.user_id
            WHERE ur.role_id = ?
            ORDER BY u.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    /// Assign a role to a user by role name. Already-assigned is a no-op.
    pub async fn assign_role_to_user(
        &self,
        user_id: i64,
        role_name: &str,
    ) -> Result<Role, RbacError> {
        let role = self
            .get_role_by_name(role_name)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound(role_name.to_string()))?;

        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(role.id)
            .execute(&self.db)
            .await?;

        info!(user_id, role = role_name, "Assigned role to user");
        Ok(role)
    }

    pub async fn remove_role_from_user(
        &self,
        user_id: i64,
        role_name: &str,
    ) -> Result<Role, RbacError> {
        let role = self
            .get_role_by_name(role_name)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound(role_name.to_string()))?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = ? AND role_id = ?")
            .bind(user_id)
            .bind(role.id)
            .execute(&self.db)
            .await?;

        info!(user_id, role = role_name, "Removed role from user");
        Ok(role)
    }

    // ---- Role-permission edges ----

    pub async fn get_role_permissions(&self, role_id: i64) -> Result<Vec<Permission>, RbacError> {
        let permissions = sqlx::query_as(
            r#"
            SELECT p.* FROM permissions p
            JOIN role_permissions rp ON p.id = rp.permission_id
            WHERE rp.role_id = ?
            ORDER BY p.id
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.db)
        .await?;
        Ok(permissions)
    }

    /// Grant a permission to a role, both looked up by name. Returns the
    /// resolved pair so callers can mirror the grant elsewhere.
    pub async fn assign_permission_to_role(
        &self,
        role_name: &str,
        permission_name: &str,
    ) -> Result<(Role, Permission), RbacError> {
        let role = self
            .get_role_by_name(role_name)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound(role_name.to_string()))?;
        let permission = self
            .get_permission_by_name(permission_name)
            .await?
            .ok_or_else(|| RbacError::PermissionNotFound(permission_name.to_string()))?;

        sqlx::query("INSERT OR IGNORE INTO role_permissions (role_id, permission_id) VALUES (?, ?)")
            .bind(role.id)
            .bind(permission.id)
            .execute(&self.db)
            .await?;

        info!(
            role = role_name,
            permission = permission_name,
            "Granted permission to role"
        );
        Ok((role, permission))
    }

    pub async fn remove_permission_from_role(
        &self,
        role_name: &str,
        permission_name: &str,
    ) -> Result<(Role, Permission), RbacError> {
        let role = self
            .get_role_by_name(role_name)
            .await?
            .ok_or_else(|| RbacError::RoleNotFound(role_name.to_string()))?;
        let permission = self
            .get_permission_by_name(permission_name)
            .await?
            .ok_or_else(|| RbacError::PermissionNotFound(permission_name.to_string()))?;

        sqlx::query("DELETE FROM role_permissions WHERE role_id = ? AND permission_id = ?")
            .bind(role.id)
            .bind(permission.id)
            .execute(&self.db)
            .await?;

        info!(
            role = role_name,
            permission = permission_name,
            "Revoked permission from role"
        );
        Ok((role, permission))
    }

    // ---- Checks ----

    /// True when any of the user's roles carries a permission matching
    /// the (resource, action) pair
    pub async fn has_permission(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
    ) -> Result<bool, RbacError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM user_roles ur
            JOIN role_permissions rp ON ur.role_id = rp.role_id
            JOIN permissions p ON rp.permission_id = p.id
            WHERE ur.user_id = ? AND p.resource = ? AND p.action = ?
            "#,
        )
        .bind(user_id)
        .bind(resource)
        .bind(action)
        .fetch_one(&self.db)
        .await?;

        debug!(user_id, resource, action, allowed = count > 0, "Permission check");
        Ok(count > 0)
    }

    pub async fn has_role(&self, user_id: i64, role_name: &str) -> Result<bool, RbacError> {
        let (count,): (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM user_roles ur
            JOIN roles r ON ur.role_id = r.id
            WHERE ur.user_id = ? AND r.name = ?
            "#,
        )
        .bind(user_id)
        .bind(role_name)
        .fetch_one(&self.db)
        .await?;
        Ok(count > 0)
    }

    /// Enforcing variant of `has_permission`: lacking the permission is a
    /// `PermissionDenied` error for callers on the rejection path
    pub async fn check_permission(
        &self,
        user_id: i64,
        resource: &str,
        action: &str,
    ) -> Result<(), RbacError> {
        if self.has_permission(user_id, resource, action).await? {
            Ok(())
        } else {
            Err(RbacError::PermissionDenied {
                resource: resource.to_string(),
                action: action.to_string(),
            })
        }
    }
}
