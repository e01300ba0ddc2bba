//! Authentication data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// JWT claims structure
///
/// `jti` uniquely identifies each issued access token and is what a refresh
/// token row is bound to. Timestamps are unix seconds.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Claims {
    pub user_id: i64,
    pub email: String,
    pub jti: String,
    pub iat: i64,
    pub nbf: i64,
    pub exp: i64,
}

/// User database model
///
/// `password_hash` is an argon2id PHC string for locally registered users
/// and NULL for accounts created through an external login provider.
#[derive(FromRow, Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub name: Option<String>,
    pub email: String,
    #[serde(skip)]
    pub password_hash: Option<String>,
    pub provider_id: Option<String>,
    pub provider_name: Option<String>,
    pub created_at: Option<String>,
}

/// Persisted refresh token entity
///
/// A non-revoked, non-expired row maps to exactly one currently valid
/// access token jti; rotation updates the jti in place and never changes
/// the opaque `token` secret.
#[derive(FromRow, Serialize, Debug, Clone)]
pub struct RefreshToken {
    pub id: i64,
    pub user_id: i64,
    pub token: String,
    pub access_token_jti: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub device_info: String,
    pub ip_address: String,
}

/// Access/refresh token pair returned by login and refresh
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
}

/// Login request body
#[derive(Deserialize, Debug)]
pub struct AuthRequest {
    pub email: String,
    pub password: String,
}

/// Refresh request body; the secret may also arrive via cookie
#[derive(Deserialize, Debug)]
pub struct RefreshTokenRequest {
    pub refresh_token: String,
}
