// src/services/tokens.rs
//! Access token codec: issues and verifies signed, time-bounded JWTs.
//!
//! Stateless; every token carries its own validity window and a unique
//! jti, so no lock is held anywhere in this service.

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use std::env;
use tracing::debug;
use uuid::Uuid;

use crate::auth::models::{Claims, User};
use crate::services::auth::AuthError;

/// Token lifetime configuration, loaded from the environment
#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "replace_with_strong_secret".to_string(),
            access_token_ttl: Duration::minutes(15),
            refresh_token_ttl: Duration::days(7),
        }
    }
}

impl TokenConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(secret) = env::var("JWT_SECRET") {
            if !secret.is_empty() {
                config.secret = secret;
            }
        }

        // JWT_DURATION_MINUTES - access token lifetime
        if let Ok(minutes) = env::var("JWT_DURATION_MINUTES") {
            if let Ok(val) = minutes.parse::<i64>() {
                config.access_token_ttl = Duration::minutes(val);
            }
        }

        // REFRESH_TOKEN_DURATION_DAYS - refresh token lifetime
        if let Ok(days) = env::var("REFRESH_TOKEN_DURATION_DAYS") {
            if let Ok(val) = days.parse::<i64>() {
                config.refresh_token_ttl = Duration::days(val);
            }
        }

        config
    }
}

/// Issues and verifies HS256 access tokens
#[derive(Debug)]
pub struct TokenService {
    secret: String,
    access_ttl: Duration,
}

impl TokenService {
    pub fn new(config: &TokenConfig) -> Self {
        Self {
            secret: config.secret.clone(),
            access_ttl: config.access_token_ttl,
        }
    }

    pub fn access_ttl(&self) -> Duration {
        self.access_ttl
    }

    /// Build and sign an access token for the user.
    /// Returns the encoded token together with the claims it carries, so
    /// callers can bind the jti without re-parsing the token.
    pub fn issue(&self, user: &User) -> Result<(String, Claims), AuthError> {
        let now = Utc::now();
        let claims = Claims {
            user_id: user.id,
            email: user.email.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: (now + self.access_ttl).timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(AuthError::Signing)?;

        debug!(user_id = user.id, jti = %claims.jti, "Issued access token");
        Ok((token, claims))
    }

    /// Parse and validate a token's signature and time claims.
    ///
    /// Expiry is reported as `TokenExpired` so callers can offer a refresh;
    /// every other signature/format failure collapses to `TokenInvalid`.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Exact expiry boundary: no leeway window
        validation.leeway = 0;
        validation.validate_nbf = true;

        match decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        ) {
            Ok(data) => Ok(data.claims),
            Err(e) => match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => Err(AuthError::TokenExpired),
                _ => Err(AuthError::TokenInvalid),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user() -> User {
        User {
            id: 42,
            name: Some("Test User".to_string()),
            email: "test@example.com".to_string(),
            password_hash: None,
            provider_id: None,
            provider_name: None,
            created_at: None,
        }
    }

    fn service_with_ttl(ttl: Duration) -> TokenService {
        TokenService::new(&TokenConfig {
            secret: "test_secret_key".to_string(),
            access_token_ttl: ttl,
            refresh_token_ttl: Duration::days(7),
        })
    }

    #[test]
    fn issue_and_verify_round_trip() {
        let service = service_with_ttl(Duration::minutes(15));
        let user = test_user();

        let (token, issued) = service.issue(&user).unwrap();
        let verified = service.verify(&token).unwrap();

        assert_eq!(verified.user_id, 42);
        assert_eq!(verified.email, "test@example.com");
        assert_eq!(verified.jti, issued.jti);
        assert_eq!(verified.exp - verified.iat, 15 * 60);
    }

    #[test]
    fn verify_is_idempotent_within_window() {
        let service = service_with_ttl(Duration::minutes(15));
        let (token, _) = service.issue(&test_user()).unwrap();

        let first = service.verify(&token).unwrap();
        let second = service.verify(&token).unwrap();
        assert_eq!(first.jti, second.jti);
        assert_eq!(first.exp, second.exp);
    }

    #[test]
    fn each_token_gets_a_fresh_jti() {
        let service = service_with_ttl(Duration::minutes(15));
        let (_, a) = service.issue(&test_user()).unwrap();
        let (_, b) = service.issue(&test_user()).unwrap();
        assert_ne!(a.jti, b.jti);
    }

    #[test]
    fn expired_token_reports_token_expired() {
        // A negative ttl puts exp in the past at issue time
        let service = service_with_ttl(Duration::minutes(-5));
        let (token, _) = service.issue(&test_user()).unwrap();

        match service.verify(&token) {
            Err(AuthError::TokenExpired) => {}
            other => panic!("expected TokenExpired, got {:?}", other),
        }
    }

    #[test]
    fn wrong_secret_reports_token_invalid() {
        let service = service_with_ttl(Duration::minutes(15));
        let (token, _) = service.issue(&test_user()).unwrap();

        let other = TokenService::new(&TokenConfig {
            secret: "a_different_secret".to_string(),
            ..TokenConfig::default()
        });
        match other.verify(&token) {
            Err(AuthError::TokenInvalid) => {}
            other => panic!("expected TokenInvalid, got {:?}", other),
        }
    }

    #[test]
    fn garbage_reports_token_invalid() {
        let service = service_with_ttl(Duration::minutes(15));
        match service.verify("not.a.jwt") {
            Err(AuthError::TokenInvalid) => {}
            other => panic!("expected TokenInvalid, got {:?}", other),
        }
    }
}
