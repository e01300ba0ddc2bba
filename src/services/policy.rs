// src/services/policy.rs
//! Policy-engine authorization variant, backed by a casbin enforcer.
//!
//! Policies are (role, resource, action) tuples; grouping policies map
//! subjects to roles and roles to parent roles, so membership resolves
//! with inheritance. Writes go through the enforcer synchronously and are
//! visible to the next check immediately.

use casbin::prelude::*;
use std::result::Result;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

const MODEL: &str = r#"
[request_definition]
r = sub, obj, act

[policy_definition]
p = sub, obj, act

[role_definition]
g = _, _

[policy_effect]
e = some(where (p.eft == allow))

[matchers]
m = g(r.sub, p.sub) && r.obj == p.obj && r.act == p.act
"#;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("permission denied: {resource}:{action}")]
    PermissionDenied { resource: String, action: String },

    #[error("policy engine error: {0}")]
    Engine(#[from] casbin::Error),

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

/// Rule-matching authorization engine sharing the relational variant's
/// check contract
pub struct PolicyService {
    // The enforcer mutates internal role-link state even on reads, so all
    // access funnels through one writer lock
    enforcer: RwLock<Enforcer>,
}

impl PolicyService {
    pub async fn new() -> Result<Self, PolicyError> {
        let model = DefaultModel::from_str(MODEL).await?;
        let adapter = MemoryAdapter::default();
        let enforcer = Enforcer::new(model, adapter).await?;
        Ok(Self {
            enforcer: RwLock::new(enforcer),
        })
    }

    // ---- Policy management ----

    pub async fn add_policy(
        &self,
        role: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        let added = self
            .enforcer
            .write()
            .await
            .add_policy(vec![role.to_string(), resource.to_string(), action.to_string()])
            .await?;
        if added {
            info!(role, resource, action, "Added policy tuple");
        }
        Ok(added)
    }

    pub async fn remove_policy(
        &self,
        role: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        let removed = self
            .enforcer
            .write()
            .await
            .remove_policy(vec![role.to_string(), resource.to_string(), action.to_string()])
            .await?;
        if removed {
            info!(role, resource, action, "Removed policy tuple");
        }
        Ok(removed)
    }

    pub async fn policies(&self) -> Vec<Vec<String>> {
        self.enforcer.read().await.get_policy()
    }

    // ---- Role grants ----

    /// Grant a role to a subject. The subject may itself be a role name,
    /// which is how role inheritance is expressed.
    pub async fn add_role_for_subject(
        &self,
        subject: &str,
        role: &str,
    ) -> Result<bool, PolicyError> {
        let added = self
            .enforcer
            .write()
            .await
            .add_role_for_user(subject, role, None)
            .await?;
        if added {
            info!(subject, role, "Granted role to subject");
        }
        Ok(added)
    }

    pub async fn remove_role_for_subject(
        &self,
        subject: &str,
        role: &str,
    ) -> Result<bool, PolicyError> {
        let removed = self
            .enforcer
            .write()
            .await
            .delete_role_for_user(subject, role, None)
            .await?;
        if removed {
            info!(subject, role, "Revoked role from subject");
        }
        Ok(removed)
    }

    pub async fn roles_for_subject(&self, subject: &str) -> Vec<String> {
        self.enforcer.write().await.get_roles_for_user(subject, None)
    }

    pub async fn subjects_for_role(&self, role: &str) -> Vec<String> {
        self.enforcer.read().await.get_users_for_role(role, None)
    }

    pub async fn has_role_for_subject(&self, subject: &str, role: &str) -> bool {
        self.enforcer
            .write()
            .await
            .has_role_for_user(subject, role, None)
    }

    /// Drop every tuple mentioning a role: its policies and any grouping
    /// edges granting it. Used when the role itself is deleted.
    pub async fn remove_role_tuples(&self, role: &str) -> Result<(), PolicyError> {
        let mut enforcer = self.enforcer.write().await;
        enforcer
            .remove_filtered_policy(0, vec![role.to_string()])
            .await?;
        enforcer
            .remove_filtered_grouping_policy(1, vec![role.to_string()])
            .await?;
        info!(role, "Removed all policy tuples for role");
        Ok(())
    }

    /// Drop every policy tuple matching a (resource, action) pair. Used
    /// when the backing permission is deleted.
    pub async fn remove_policies_for_permission(
        &self,
        resource: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        self.enforcer
            .write()
            .await
            .remove_filtered_policy(1, vec![resource.to_string(), action.to_string()])
            .await?;
        info!(resource, action, "Removed policy tuples for permission");
        Ok(())
    }

    // ---- Checks ----

    pub async fn enforce(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
    ) -> Result<bool, PolicyError> {
        let allowed = self
            .enforcer
            .read()
            .await
            .enforce((subject, resource, action))?;
        debug!(subject, resource, action, allowed, "Policy check");
        Ok(allowed)
    }

    /// Enforcing variant: a false result becomes `PermissionDenied`
    pub async fn check_permission(
        &self,
        subject: &str,
        resource: &str,
        action: &str,
    ) -> Result<(), PolicyError> {
        if self.enforce(subject, resource, action).await? {
            Ok(())
        } else {
            Err(PolicyError::PermissionDenied {
                resource: resource.to_string(),
                action: action.to_string(),
            })
        }
    }

    /// Mirror the relational tables into the enforcer: role-permission
    /// grants become policy tuples, user-role edges become grouping
    /// tuples. Run once at startup so both representations agree before
    /// any administrative dual writes happen.
    pub async fn sync_from_relational(&self, db: &SqlitePool) -> Result<(), PolicyError> {
        let grants: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT r.name, p.resource, p.action
            FROM role_permissions rp
            JOIN roles r ON rp.role_id = r.id
            JOIN permissions p ON rp.permission_id = p.id
            "#,
        )
        .fetch_all(db)
        .await?;

        let memberships: Vec<(i64, String)> = sqlx::query_as(
            r#"
            SELECT ur.user_id, r.name
            FROM user_roles ur
            JOIN roles r ON ur.role_id = r.id
            "#,
        )
        .fetch_all(db)
        .await?;

        let mut enforcer = self.enforcer.write().await;
        let mut loaded = 0usize;
        for (role, resource, action) in grants {
            if enforcer.add_policy(vec![role, resource, action]).await? {
                loaded += 1;
            }
        }
        for (user_id, role) in memberships {
            if enforcer
                .add_role_for_user(&user_id.to_string(), &role, None)
                .await?
            {
                loaded += 1;
            }
        }

        info!(loaded, "Synced relational grants into the policy engine");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn grant_then_revoke_controls_enforcement() {
        let service = PolicyService::new().await.unwrap();

        service.add_policy("editor", "articles", "write").await.unwrap();
        service.add_role_for_subject("7", "editor").await.unwrap();

        assert!(service.enforce("7", "articles", "write").await.unwrap());
        assert!(service.check_permission("7", "articles", "write").await.is_ok());

        service.remove_role_for_subject("7", "editor").await.unwrap();
        assert!(!service.enforce("7", "articles", "write").await.unwrap());
    }

    #[tokio::test]
    async fn subject_without_roles_is_denied() {
        let service = PolicyService::new().await.unwrap();
        service.add_policy("admin", "content", "delete").await.unwrap();

        assert!(!service.enforce("99", "content", "delete").await.unwrap());
        match service.check_permission("99", "content", "delete").await {
            Err(PolicyError::PermissionDenied { resource, action }) => {
                assert_eq!(resource, "content");
                assert_eq!(action, "delete");
            }
            other => panic!("expected PermissionDenied, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn role_inheritance_resolves_transitively() {
        let service = PolicyService::new().await.unwrap();

        service.add_policy("admin", "content", "delete").await.unwrap();
        // editor inherits admin; subject 3 is an editor
        service.add_role_for_subject("editor", "admin").await.unwrap();
        service.add_role_for_subject("3", "editor").await.unwrap();

        assert!(service.enforce("3", "content", "delete").await.unwrap());
    }

    #[tokio::test]
    async fn membership_queries_reflect_grants() {
        let service = PolicyService::new().await.unwrap();

        service.add_role_for_subject("5", "viewer").await.unwrap();

        assert!(service.has_role_for_subject("5", "viewer").await);
        assert!(!service.has_role_for_subject("5", "admin").await);
        assert_eq!(service.roles_for_subject("5").await, vec!["viewer"]);
        assert_eq!(service.subjects_for_role("viewer").await, vec!["5"]);
    }

    #[tokio::test]
    async fn duplicate_policy_reports_not_added() {
        let service = PolicyService::new().await.unwrap();

        assert!(service.add_policy("user", "content", "read").await.unwrap());
        assert!(!service.add_policy("user", "content", "read").await.unwrap());
        assert_eq!(service.policies().await.len(), 1);
    }

    #[tokio::test]
    async fn removing_unknown_policy_reports_false() {
        let service = PolicyService::new().await.unwrap();
        assert!(!service.remove_policy("ghost", "x", "y").await.unwrap());
    }

    #[tokio::test]
    async fn removing_role_tuples_revokes_members_and_policies() {
        let service = PolicyService::new().await.unwrap();

        service.add_policy("editor", "articles", "write").await.unwrap();
        service.add_role_for_subject("7", "editor").await.unwrap();
        assert!(service.enforce("7", "articles", "write").await.unwrap());

        service.remove_role_tuples("editor").await.unwrap();

        assert!(!service.enforce("7", "articles", "write").await.unwrap());
        assert!(service.policies().await.is_empty());
        assert!(service.roles_for_subject("7").await.is_empty());
    }

    #[tokio::test]
    async fn removing_permission_tuples_only_hits_matching_pairs() {
        let service = PolicyService::new().await.unwrap();

        service.add_policy("editor", "articles", "write").await.unwrap();
        service.add_policy("editor", "articles", "read").await.unwrap();

        service
            .remove_policies_for_permission("articles", "write")
            .await
            .unwrap();

        let remaining = service.policies().await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0], vec!["editor", "articles", "read"]);
    }

    #[tokio::test]
    async fn sync_mirrors_relational_seeds() {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        crate::common::migrations::run_migrations(&pool).await.unwrap();

        sqlx::query("INSERT INTO users (name, email) VALUES ('Sync', 'sync@example.com')")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT u.id, r.id FROM users u, roles r WHERE u.email = 'sync@example.com' AND r.name = 'admin'",
        )
        .execute(&pool)
        .await
        .unwrap();

        let service = PolicyService::new().await.unwrap();
        service.sync_from_relational(&pool).await.unwrap();

        let (user_id,): (i64,) =
            sqlx::query_as("SELECT id FROM users WHERE email = 'sync@example.com'")
                .fetch_one(&pool)
                .await
                .unwrap();

        // Seeded grant: admin may delete content
        assert!(service
            .enforce(&user_id.to_string(), "content", "delete")
            .await
            .unwrap());
    }
}
