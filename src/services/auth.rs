// src/services/auth.rs
//! Session orchestration: login, refresh, logout, access token validation.
//!
//! Owns token-pair issuance policy by composing the credential validator,
//! the access token codec and the refresh token store. This is the only
//! module that decides when a pair gets minted.

use sqlx::SqlitePool;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::auth::models::{Claims, TokenPair, User};
use crate::common::secrets::{hash_password, verify_password};
use crate::common::safe_email_log;
use crate::services::refresh_tokens::RefreshTokenService;
use crate::services::tokens::TokenService;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("token is invalid")]
    TokenInvalid,

    #[error("token has expired")]
    TokenExpired,

    #[error("refresh token not found")]
    RefreshTokenNotFound,

    #[error("refresh token has expired")]
    RefreshTokenExpired,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),
}

/// Composes credential validation and token lifecycle into the login,
/// refresh and logout operations consumed by the HTTP layer
pub struct AuthService {
    db: SqlitePool,
    tokens: Arc<TokenService>,
    refresh_tokens: Arc<RefreshTokenService>,
    /// Verified against when the email is unknown, so lookup misses take
    /// the same time as password mismatches
    dummy_hash: String,
}

impl AuthService {
    pub fn new(
        db: SqlitePool,
        tokens: Arc<TokenService>,
        refresh_tokens: Arc<RefreshTokenService>,
    ) -> Result<Self, password_hash::Error> {
        let dummy_hash = hash_password("dummy-credential")?;
        Ok(Self {
            db,
            tokens,
            refresh_tokens,
            dummy_hash,
        })
    }

    /// Check a submitted email/password pair against the user store.
    /// No side effects; accounts created via an external provider carry
    /// no password hash and can never pass.
    pub async fn validate_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.db)
            .await?;

        match user {
            Some(user) => match user.password_hash.as_deref() {
                Some(hash) if verify_password(hash, password) => Ok(user),
                _ => {
                    warn!(
                        email = %safe_email_log(email),
                        "Login failed: password mismatch"
                    );
                    Err(AuthError::InvalidCredentials)
                }
            },
            None => {
                // Burn the same hashing work for unknown emails
                let _ = verify_password(&self.dummy_hash, password);
                warn!(email = %safe_email_log(email), "Login failed: unknown email");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    /// Validate credentials and mint a token pair for the session
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        device_info: &str,
        ip_address: &str,
    ) -> Result<(TokenPair, User), AuthError> {
        let user = self.validate_credentials(email, password).await?;
        let pair = self
            .refresh_tokens
            .create(&user, device_info, ip_address)
            .await?;

        info!(
            user_id = user.id,
            email = %safe_email_log(&user.email),
            "User logged in"
        );
        Ok((pair, user))
    }

    /// Exchange a refresh secret for a fresh access token
    pub async fn refresh(&self, refresh_secret: &str) -> Result<TokenPair, AuthError> {
        self.refresh_tokens.refresh(refresh_secret).await
    }

    /// Revoke every refresh token for the user. Best-effort: a storage
    /// failure is logged for operators but never fails the logout.
    pub async fn logout(&self, user_id: i64) {
        match self.refresh_tokens.revoke_all(user_id).await {
            Ok(revoked) => {
                info!(user_id, revoked, "User logged out, refresh tokens revoked");
            }
            Err(e) => {
                error!(
                    user_id,
                    error = %e,
                    "Failed to revoke refresh tokens on logout"
                );
            }
        }
    }

    /// Verify an access token and return its claims
    pub fn validate_access_token(&self, token: &str) -> Result<Claims, AuthError> {
        self.tokens.verify(token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use crate::services::tokens::TokenConfig;
    use chrono::Duration;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    fn auth_service(pool: &SqlitePool) -> AuthService {
        let tokens = Arc::new(TokenService::new(&TokenConfig {
            secret: "test_secret_key".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
        }));
        let refresh_tokens = Arc::new(RefreshTokenService::new(
            pool.clone(),
            tokens.clone(),
            Duration::days(7),
        ));
        AuthService::new(pool.clone(), tokens, refresh_tokens).unwrap()
    }

    async fn register_user(pool: &SqlitePool, email: &str, password: &str) -> User {
        let hash = hash_password(password).unwrap();
        sqlx::query("INSERT INTO users (name, email, password_hash) VALUES (?, ?, ?)")
            .bind("Alice")
            .bind(email)
            .bind(hash)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn full_session_lifecycle() {
        let pool = setup_test_db().await;
        let service = auth_service(&pool);
        let user = register_user(&pool, "alice@example.com", "secret").await;

        // Login yields a pair whose access token verifies to the user
        let (pair, logged_in) = service
            .login("alice@example.com", "secret", "cli", "127.0.0.1")
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);

        let claims = service.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(claims.email, "alice@example.com");
        assert_eq!(claims.user_id, user.id);

        // Refresh keeps the identity and the secret
        let refreshed = service.refresh(&pair.refresh_token).await.unwrap();
        let new_claims = service
            .validate_access_token(&refreshed.access_token)
            .unwrap();
        assert_eq!(new_claims.user_id, user.id);
        assert_eq!(refreshed.refresh_token, pair.refresh_token);

        // Logout revokes; the old secret is dead afterwards
        service.logout(user.id).await;
        match service.refresh(&pair.refresh_token).await {
            Err(AuthError::RefreshTokenNotFound) => {}
            other => panic!("expected RefreshTokenNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let pool = setup_test_db().await;
        let service = auth_service(&pool);
        register_user(&pool, "bob@example.com", "correct").await;

        match service.validate_credentials("bob@example.com", "wrong").await {
            Err(AuthError::InvalidCredentials) => {}
            other => panic!("expected InvalidCredentials, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn unknown_email_is_rejected() {
        let pool = setup_test_db().await;
        let service = auth_service(&pool);

        match service
            .validate_credentials("ghost@example.com", "anything")
            .await
        {
            Err(AuthError::InvalidCredentials) => {}
            other => panic!("expected InvalidCredentials, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn provider_accounts_cannot_password_login() {
        let pool = setup_test_db().await;
        let service = auth_service(&pool);

        sqlx::query(
            "INSERT INTO users (name, email, provider_id, provider_name) VALUES (?, ?, ?, ?)",
        )
        .bind("OAuth Only")
        .bind("oauth@example.com")
        .bind("ext-123")
        .bind("google")
        .execute(&pool)
        .await
        .unwrap();

        match service.validate_credentials("oauth@example.com", "").await {
            Err(AuthError::InvalidCredentials) => {}
            other => panic!("expected InvalidCredentials, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn logout_swallows_storage_failures() {
        let pool = setup_test_db().await;
        let service = auth_service(&pool);

        // Dropping the table forces a storage error underneath revoke_all
        sqlx::query("DROP TABLE refresh_tokens")
            .execute(&pool)
            .await
            .unwrap();

        // Must not panic or propagate; the logout contract is fail-soft
        service.logout(1).await;
    }
}
