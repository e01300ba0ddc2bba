// src/services/refresh_tokens.rs
//! Refresh token store and rotator.
//!
//! Refresh secrets are long-lived and reusable until revoked or expired;
//! only the paired access token (and its jti binding) rotates on each
//! refresh. Revocation marks rows; a periodic sweep physically deletes
//! rows that are expired or revoked beyond the retention window.

use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::auth::models::{RefreshToken, TokenPair, User};
use crate::common::secrets::generate_refresh_secret;
use crate::services::auth::AuthError;
use crate::services::tokens::TokenService;

/// Revoked rows are kept this long before the sweep deletes them
const RETENTION_DAYS: i64 = 7;
/// How often the background sweep runs
const SWEEP_INTERVAL_SECS: u64 = 60 * 60;

/// Persists refresh tokens and rotates their paired access tokens
pub struct RefreshTokenService {
    db: SqlitePool,
    tokens: Arc<TokenService>,
    refresh_ttl: Duration,
}

impl RefreshTokenService {
    pub fn new(db: SqlitePool, tokens: Arc<TokenService>, refresh_ttl: Duration) -> Self {
        Self {
            db,
            tokens,
            refresh_ttl,
        }
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    /// Issue a new token pair for the user and persist the refresh side,
    /// bound to the access token's jti
    pub async fn create(
        &self,
        user: &User,
        device_info: &str,
        ip_address: &str,
    ) -> Result<TokenPair, AuthError> {
        let (access_token, claims) = self.tokens.issue(user)?;
        let secret = generate_refresh_secret();
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO refresh_tokens (
                user_id, token, access_token_jti, expires_at,
                created_at, updated_at, device_info, ip_address
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(user.id)
        .bind(&secret)
        .bind(&claims.jti)
        .bind(now + self.refresh_ttl)
        .bind(now)
        .bind(now)
        .bind(device_info)
        .bind(ip_address)
        .execute(&self.db)
        .await?;

        debug!(user_id = user.id, jti = %claims.jti, "Created refresh token");

        Ok(TokenPair {
            access_token,
            refresh_token: secret,
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }

    /// Rotate the access token paired with a refresh secret.
    ///
    /// The row's jti and last-used stamp are updated in a single
    /// transaction; the caller gets back the same refresh secret with a
    /// fresh access token. Reusing the secret is the deliberate design
    /// here, not rotation-on-use.
    pub async fn refresh(&self, refresh_secret: &str) -> Result<TokenPair, AuthError> {
        let row: Option<RefreshToken> =
            sqlx::query_as("SELECT * FROM refresh_tokens WHERE token = ? AND revoked = 0")
                .bind(refresh_secret)
                .fetch_optional(&self.db)
                .await?;

        let row = row.ok_or(AuthError::RefreshTokenNotFound)?;

        if row.expires_at < Utc::now() {
            return Err(AuthError::RefreshTokenExpired);
        }

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(row.user_id)
            .fetch_optional(&self.db)
            .await?;

        let Some(user) = user else {
            // Owning user is gone; the token is dead
            warn!(user_id = row.user_id, "Refresh token points at missing user");
            return Err(AuthError::RefreshTokenNotFound);
        };

        let (access_token, claims) = self.tokens.issue(&user)?;
        let now = Utc::now();

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "UPDATE refresh_tokens SET access_token_jti = ?, last_used_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&claims.jti)
        .bind(now)
        .bind(now)
        .bind(row.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        debug!(user_id = user.id, jti = %claims.jti, "Rotated access token via refresh");

        Ok(TokenPair {
            access_token,
            refresh_token: row.token,
            expires_in: self.tokens.access_ttl().num_seconds(),
        })
    }

    /// Revoke a single refresh token by row id
    pub async fn revoke(&self, token_id: i64) -> Result<(), AuthError> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1, revoked_at = ?, updated_at = ? WHERE id = ? AND revoked = 0",
        )
        .bind(now)
        .bind(now)
        .bind(token_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    /// Revoke every active refresh token for a user. Idempotent; zero
    /// matching rows is not an error.
    pub async fn revoke_all(&self, user_id: i64) -> Result<u64, AuthError> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1, revoked_at = ?, updated_at = ? WHERE user_id = ? AND revoked = 0",
        )
        .bind(now)
        .bind(now)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete rows that are expired, or revoked longer ago than the
    /// retention window. Runs from the background task, never from
    /// request paths.
    pub async fn sweep(&self) -> Result<u64, AuthError> {
        let now = Utc::now();
        let retention_cutoff = now - Duration::days(RETENTION_DAYS);
        let result = sqlx::query(
            "DELETE FROM refresh_tokens WHERE expires_at < ? OR (revoked = 1 AND revoked_at < ?)",
        )
        .bind(now)
        .bind(retention_cutoff)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Start the periodic expiry sweep. Validation re-checks expiry
    /// inline, so the sweep only reclaims space.
    pub fn start_sweep_task(service: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(tokio::time::Duration::from_secs(SWEEP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                match service.sweep().await {
                    Ok(0) => {}
                    Ok(swept) => info!(swept, "Swept dead refresh tokens"),
                    Err(e) => error!(error = %e, "Refresh token sweep failed"),
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::migrations::run_migrations;
    use crate::services::tokens::TokenConfig;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        pool
    }

    async fn insert_user(pool: &SqlitePool, email: &str) -> User {
        sqlx::query("INSERT INTO users (name, email) VALUES (?, ?)")
            .bind("Test User")
            .bind(email)
            .execute(pool)
            .await
            .unwrap();
        sqlx::query_as("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    fn service(pool: &SqlitePool, refresh_ttl: Duration) -> RefreshTokenService {
        let tokens = Arc::new(TokenService::new(&TokenConfig {
            secret: "test_secret_key".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: refresh_ttl,
        }));
        RefreshTokenService::new(pool.clone(), tokens, refresh_ttl)
    }

    #[tokio::test]
    async fn create_binds_the_access_token_jti() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "bind@example.com").await;
        let service = service(&pool, Duration::days(7));

        let pair = service.create(&user, "cli", "127.0.0.1").await.unwrap();

        let row: RefreshToken = sqlx::query_as("SELECT * FROM refresh_tokens WHERE token = ?")
            .bind(&pair.refresh_token)
            .fetch_one(&pool)
            .await
            .unwrap();

        let claims = service.tokens.verify(&pair.access_token).unwrap();
        assert_eq!(row.access_token_jti, claims.jti);
        assert_eq!(row.user_id, user.id);
        assert!(!row.revoked);
        assert_eq!(pair.expires_in, 15 * 60);
    }

    #[tokio::test]
    async fn refresh_rotates_jti_but_keeps_the_secret() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "rotate@example.com").await;
        let service = service(&pool, Duration::days(7));

        let pair = service.create(&user, "", "").await.unwrap();
        let first = service.refresh(&pair.refresh_token).await.unwrap();
        let second = service.refresh(&pair.refresh_token).await.unwrap();

        assert_eq!(first.refresh_token, pair.refresh_token);
        assert_eq!(second.refresh_token, pair.refresh_token);

        let jti_a = service.tokens.verify(&first.access_token).unwrap().jti;
        let jti_b = service.tokens.verify(&second.access_token).unwrap().jti;
        assert_ne!(jti_a, jti_b);

        // The row tracks the most recent jti and a last-used stamp
        let row: RefreshToken = sqlx::query_as("SELECT * FROM refresh_tokens WHERE token = ?")
            .bind(&pair.refresh_token)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.access_token_jti, jti_b);
        assert!(row.last_used_at.is_some());
    }

    #[tokio::test]
    async fn refresh_with_unknown_secret_fails() {
        let pool = setup_test_db().await;
        let service = service(&pool, Duration::days(7));

        match service.refresh("no-such-secret").await {
            Err(AuthError::RefreshTokenNotFound) => {}
            other => panic!("expected RefreshTokenNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn refresh_with_expired_secret_fails() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "expired@example.com").await;
        // Negative ttl: the row is already past its expiry
        let service = service(&pool, Duration::days(-1));

        let pair = service.create(&user, "", "").await.unwrap();
        match service.refresh(&pair.refresh_token).await {
            Err(AuthError::RefreshTokenExpired) => {}
            other => panic!("expected RefreshTokenExpired, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn revoke_all_blocks_refresh_and_is_idempotent() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "revoke@example.com").await;
        let service = service(&pool, Duration::days(7));

        let a = service.create(&user, "laptop", "10.0.0.1").await.unwrap();
        let b = service.create(&user, "phone", "10.0.0.2").await.unwrap();

        assert_eq!(service.revoke_all(user.id).await.unwrap(), 2);
        // Second call finds nothing and still succeeds
        assert_eq!(service.revoke_all(user.id).await.unwrap(), 0);

        for pair in [a, b] {
            match service.refresh(&pair.refresh_token).await {
                Err(AuthError::RefreshTokenNotFound) => {}
                other => panic!("expected RefreshTokenNotFound, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn revoke_single_token_leaves_others_active() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "selective@example.com").await;
        let service = service(&pool, Duration::days(7));

        let a = service.create(&user, "laptop", "").await.unwrap();
        let b = service.create(&user, "phone", "").await.unwrap();

        let row: RefreshToken = sqlx::query_as("SELECT * FROM refresh_tokens WHERE token = ?")
            .bind(&a.refresh_token)
            .fetch_one(&pool)
            .await
            .unwrap();
        service.revoke(row.id).await.unwrap();

        assert!(matches!(
            service.refresh(&a.refresh_token).await,
            Err(AuthError::RefreshTokenNotFound)
        ));
        assert!(service.refresh(&b.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_deletes_expired_and_long_revoked_rows() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "sweep@example.com").await;
        let service = service(&pool, Duration::days(7));

        let expired = service.create(&user, "", "").await.unwrap();
        let long_revoked = service.create(&user, "", "").await.unwrap();
        let keeper = service.create(&user, "", "").await.unwrap();

        sqlx::query("UPDATE refresh_tokens SET expires_at = ? WHERE token = ?")
            .bind(Utc::now() - Duration::hours(1))
            .bind(&expired.refresh_token)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("UPDATE refresh_tokens SET revoked = 1, revoked_at = ? WHERE token = ?")
            .bind(Utc::now() - Duration::days(8))
            .bind(&long_revoked.refresh_token)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(service.sweep().await.unwrap(), 2);

        let (remaining,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM refresh_tokens")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
        assert!(service.refresh(&keeper.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn sweep_keeps_recently_revoked_rows() {
        let pool = setup_test_db().await;
        let user = insert_user(&pool, "retention@example.com").await;
        let service = service(&pool, Duration::days(7));

        service.create(&user, "", "").await.unwrap();
        service.revoke_all(user.id).await.unwrap();

        // Revoked just now: still inside the retention window
        assert_eq!(service.sweep().await.unwrap(), 0);
    }
}
