// src/services/users.rs
//! User store: lookups, registration and external-provider account linking.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{debug, info};

use crate::auth::models::User;
use crate::common::secrets::hash_password;
use crate::common::safe_email_log;
use crate::oauth::models::OAuthUser;

#[derive(Debug, Error)]
pub enum UserError {
    #[error("user not found")]
    NotFound,

    #[error("email already registered")]
    EmailTaken,

    #[error("password hashing failed")]
    Hashing,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub struct UserService {
    db: SqlitePool,
}

impl UserService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// A missing row is an expected outcome, not an error
    pub async fn get_by_id(&self, id: i64) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let user = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;
        Ok(user)
    }

    pub async fn list(&self) -> Result<Vec<User>, UserError> {
        let users = sqlx::query_as("SELECT * FROM users ORDER BY id")
            .fetch_all(&self.db)
            .await?;
        Ok(users)
    }

    /// Register a local account with an argon2-hashed password
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, UserError> {
        if self.get_by_email(email).await?.is_some() {
            return Err(UserError::EmailTaken);
        }

        let hash = hash_password(password).map_err(|_| UserError::Hashing)?;
        sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind(name)
            .bind(email)
            .bind(hash)
            .execute(&self.db)
            .await?;

        info!(email = %safe_email_log(email), "Registered new user");

        let user = self
            .get_by_email(email)
            .await?
            .ok_or(UserError::NotFound)?;
        Ok(user)
    }

    pub async fn update(&self, id: i64, name: &str, email: &str) -> Result<User, UserError> {
        let result = sqlx::query("UPDATE users SET name = ?, email = ? WHERE id = ?")
            .bind(name)
            .bind(email)
            .bind(id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        self.get_by_id(id).await?.ok_or(UserError::NotFound)
    }

    pub async fn delete(&self, id: i64) -> Result<(), UserError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(UserError::NotFound);
        }
        Ok(())
    }

    /// Find the account matching an external-provider identity, creating
    /// it on first login. Existing password-less accounts get their
    /// provider link backfilled.
    pub async fn get_or_create_oauth(&self, oauth_user: &OAuthUser) -> Result<User, UserError> {
        let existing: Option<User> = sqlx::query_as(
            "SELECT * FROM users WHERE email = ? OR (provider_id = ? AND provider_name = ?)",
        )
        .bind(&oauth_user.email)
        .bind(&oauth_user.provider_id)
        .bind(&oauth_user.provider_name)
        .fetch_optional(&self.db)
        .await?;

        match existing {
            Some(user) => {
                if user.password_hash.is_none() && user.provider_id.is_none() {
                    sqlx::query("UPDATE users SET provider_id = ?, provider_name = ? WHERE id = ?")
                        .bind(&oauth_user.provider_id)
                        .bind(&oauth_user.provider_name)
                        .bind(user.id)
                        .execute(&self.db)
                        .await?;
                }
                debug!(
                    user_id = user.id,
                    provider = %oauth_user.provider_name,
                    "Matched existing user for provider login"
                );
                Ok(user)
            }
            None => {
                sqlx::query(
                    "INSERT INTO users (name, email, provider_id, provider_name) VALUES (?, ?, ?, ?)",
                )
                .bind(&oauth_user.name)
                .bind(&oauth_user.email)
                .bind(&oauth_user.provider_id)
                .bind(&oauth_user.provider_name)
                .execute(&self.db)
                .await?;

                info!(
                    email = %safe_email_log(&oauth_user.email),
                    provider = %oauth_user.provider_name,
                    "Created user from provider login"
                );

                let user = self
                    .get_by_email(&oauth_user.email)
                    .await?
                    .ok_or(UserError::NotFound)?;
                Ok(user)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn oauth_user(email: &str) -> OAuthUser {
        OAuthUser {
            provider_id: "ext-42".to_string(),
            provider_name: "google".to_string(),
            email: email.to_string(),
            name: "Provider User".to_string(),
            picture: None,
            verified: true,
        }
    }

    #[tokio::test]
    async fn create_and_lookup() {
        let pool = setup_test_db().await;
        let service = UserService::new(pool);

        let created = service
            .create("Alice", "alice@example.com", "secret")
            .await
            .unwrap();
        assert!(created.password_hash.is_some());

        let by_email = service
            .get_by_email("alice@example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, created.id);

        let by_id = service.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(by_id.email, "alice@example.com");
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let pool = setup_test_db().await;
        let service = UserService::new(pool);

        service
            .create("Alice", "dup@example.com", "secret")
            .await
            .unwrap();
        match service.create("Other", "dup@example.com", "secret").await {
            Err(UserError::EmailTaken) => {}
            other => panic!("expected EmailTaken, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn missing_user_is_none_not_error() {
        let pool = setup_test_db().await;
        let service = UserService::new(pool);
        assert!(service.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oauth_login_creates_then_reuses() {
        let pool = setup_test_db().await;
        let service = UserService::new(pool);

        let first = service
            .get_or_create_oauth(&oauth_user("ext@example.com"))
            .await
            .unwrap();
        assert!(first.password_hash.is_none());

        let second = service
            .get_or_create_oauth(&oauth_user("ext@example.com"))
            .await
            .unwrap();
        assert_eq!(first.id, second.id);

        let all = service.list().await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn update_and_delete() {
        let pool = setup_test_db().await;
        let service = UserService::new(pool);

        let user = service
            .create("Carol", "carol@example.com", "pw")
            .await
            .unwrap();
        let updated = service
            .update(user.id, "Caroline", "carol@example.com")
            .await
            .unwrap();
        assert_eq!(updated.name.as_deref(), Some("Caroline"));

        service.delete(user.id).await.unwrap();
        match service.delete(user.id).await {
            Err(UserError::NotFound) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
    }
}
