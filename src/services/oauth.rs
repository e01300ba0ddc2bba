// src/services/oauth.rs
//! External login provider clients.
//!
//! Each provider is a config-driven client for the standard authorize /
//! token / userinfo trio. The token and userinfo endpoints are opaque
//! network calls; all this service guarantees is the normalized
//! `OAuthUser` shape coming out.

use reqwest::Client;
use std::collections::HashMap;
use std::env;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::oauth::models::{OAuthUser, ProviderToken};

#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("provider not configured: {0}")]
    UnknownProvider(String),

    #[error("state validation failed")]
    InvalidState,

    #[error("token exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("userinfo fetch failed: {0}")]
    UserInfoFailed(String),
}

#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
    pub scopes: Vec<String>,
}

/// One configured external login provider
pub struct OAuthProvider {
    config: OAuthProviderConfig,
    http: Client,
}

impl OAuthProvider {
    pub fn new(config: OAuthProviderConfig, http: Client) -> Self {
        Self { config, http }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Build the provider authorize URL carrying our CSRF state value
    pub fn authorization_url(&self, state: &str) -> String {
        format!(
            "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
            self.config.auth_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_url),
            urlencoding::encode(&self.config.scopes.join(" ")),
            urlencoding::encode(state),
        )
    }

    /// Exchange an authorization code for provider tokens
    pub async fn exchange_code(&self, code: &str) -> Result<ProviderToken, OAuthError> {
        debug!(provider = %self.config.name, "Exchanging authorization code");

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", &self.config.client_id),
                ("client_secret", &self.config.client_secret),
                ("redirect_uri", &self.config.redirect_url),
            ])
            .send()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            warn!(
                provider = %self.config.name,
                http_status = %status,
                "Provider token endpoint returned error status"
            );
            return Err(OAuthError::ExchangeFailed(format!(
                "token endpoint returned {}",
                status
            )));
        }

        let token = response
            .json::<ProviderToken>()
            .await
            .map_err(|e| OAuthError::ExchangeFailed(e.to_string()))?;

        debug!(provider = %self.config.name, "Token exchange successful");
        Ok(token)
    }

    /// Fetch the provider's userinfo and normalize it
    pub async fn fetch_user(&self, access_token: &str) -> Result<OAuthUser, OAuthError> {
        let response = self
            .http
            .get(&self.config.userinfo_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| OAuthError::UserInfoFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OAuthError::UserInfoFailed(format!(
                "userinfo endpoint returned {}",
                status
            )));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| OAuthError::UserInfoFailed(e.to_string()))?;

        self.normalize_user(&body)
    }

    /// Map a raw userinfo payload onto the common `OAuthUser` shape.
    /// Field names vary by provider (Google uses sub/name/picture, LINE
    /// uses userId/displayName/pictureUrl).
    fn normalize_user(&self, body: &serde_json::Value) -> Result<OAuthUser, OAuthError> {
        let str_field = |keys: &[&str]| -> Option<String> {
            keys.iter()
                .find_map(|k| body.get(*k).and_then(|v| v.as_str()))
                .map(str::to_string)
        };

        let provider_id = str_field(&["sub", "id", "userId"])
            .ok_or_else(|| OAuthError::UserInfoFailed("missing subject id".to_string()))?;

        let email = str_field(&["email"]).unwrap_or_else(|| {
            // LINE profiles carry no email; synthesize a stable one
            format!("{}@{}.local", provider_id, self.config.name)
        });

        let name = str_field(&["name", "displayName"]).unwrap_or_default();
        let picture = str_field(&["picture", "pictureUrl"]);
        let verified = body
            .get("email_verified")
            .or_else(|| body.get("verified_email"))
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(OAuthUser {
            provider_id,
            provider_name: self.config.name.clone(),
            email,
            name,
            picture,
            verified,
        })
    }
}

/// Registry of configured providers, built from the environment
pub struct OAuthProviders {
    providers: HashMap<String, OAuthProvider>,
}

impl OAuthProviders {
    pub fn from_env(http: Client) -> Self {
        let mut providers = HashMap::new();

        let google_client_id = env::var("GOOGLE_CLIENT_ID").unwrap_or_default();
        if !google_client_id.is_empty() {
            let config = OAuthProviderConfig {
                name: "google".to_string(),
                client_id: google_client_id,
                client_secret: env::var("GOOGLE_CLIENT_SECRET").unwrap_or_default(),
                redirect_url: env::var("GOOGLE_REDIRECT_URL").unwrap_or_else(|_| {
                    "http://localhost:8080/auth/google/callback".to_string()
                }),
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                userinfo_url: "https://openidconnect.googleapis.com/v1/userinfo".to_string(),
                scopes: vec![
                    "openid".to_string(),
                    "email".to_string(),
                    "profile".to_string(),
                ],
            };
            providers.insert(
                "google".to_string(),
                OAuthProvider::new(config, http.clone()),
            );
            info!("Google OAuth provider initialized");
        } else {
            info!("GOOGLE_CLIENT_ID not set, skipping Google OAuth initialization");
        }

        let line_channel_id = env::var("LINE_CHANNEL_ID").unwrap_or_default();
        if !line_channel_id.is_empty() {
            let config = OAuthProviderConfig {
                name: "line".to_string(),
                client_id: line_channel_id,
                client_secret: env::var("LINE_CHANNEL_SECRET").unwrap_or_default(),
                redirect_url: env::var("LINE_CALLBACK_URL")
                    .unwrap_or_else(|_| "http://localhost:8080/auth/line/callback".to_string()),
                auth_url: "https://access.line.me/oauth2/v2.1/authorize".to_string(),
                token_url: "https://api.line.me/oauth2/v2.1/token".to_string(),
                userinfo_url: "https://api.line.me/v2/profile".to_string(),
                scopes: env::var("LINE_SCOPES")
                    .unwrap_or_else(|_| "profile".to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            };
            providers.insert("line".to_string(), OAuthProvider::new(config, http));
            info!("LINE OAuth provider initialized");
        } else {
            info!("LINE_CHANNEL_ID not set, skipping LINE OAuth initialization");
        }

        info!(count = providers.len(), "OAuth providers initialized");
        Self { providers }
    }

    pub fn get(&self, name: &str) -> Option<&OAuthProvider> {
        self.providers.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_provider(name: &str) -> OAuthProvider {
        OAuthProvider::new(
            OAuthProviderConfig {
                name: name.to_string(),
                client_id: "client-123".to_string(),
                client_secret: "secret".to_string(),
                redirect_url: "http://localhost:8080/auth/test/callback".to_string(),
                auth_url: "https://provider.example/authorize".to_string(),
                token_url: "https://provider.example/token".to_string(),
                userinfo_url: "https://provider.example/userinfo".to_string(),
                scopes: vec!["openid".to_string(), "email".to_string()],
            },
            Client::new(),
        )
    }

    #[test]
    fn authorization_url_carries_state_and_scopes() {
        let provider = test_provider("test");
        let url = provider.authorization_url("abc123");

        assert!(url.starts_with("https://provider.example/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("state=abc123"));
        assert!(url.contains("scope=openid%20email"));
        assert!(url.contains(
            "redirect_uri=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Ftest%2Fcallback"
        ));
    }

    #[test]
    fn normalizes_google_style_userinfo() {
        let provider = test_provider("google");
        let user = provider
            .normalize_user(&json!({
                "sub": "g-123",
                "email": "user@example.com",
                "email_verified": true,
                "name": "G User",
                "picture": "https://example.com/p.png"
            }))
            .unwrap();

        assert_eq!(user.provider_id, "g-123");
        assert_eq!(user.provider_name, "google");
        assert_eq!(user.email, "user@example.com");
        assert_eq!(user.name, "G User");
        assert_eq!(user.picture.as_deref(), Some("https://example.com/p.png"));
        assert!(user.verified);
    }

    #[test]
    fn normalizes_line_style_userinfo_without_email() {
        let provider = test_provider("line");
        let user = provider
            .normalize_user(&json!({
                "userId": "U-9",
                "displayName": "Line User",
                "pictureUrl": "https://line.example/p.jpg"
            }))
            .unwrap();

        assert_eq!(user.provider_id, "U-9");
        assert_eq!(user.email, "U-9@line.local");
        assert_eq!(user.name, "Line User");
        assert!(!user.verified);
    }

    #[test]
    fn userinfo_without_subject_is_rejected() {
        let provider = test_provider("test");
        match provider.normalize_user(&json!({"email": "x@y.z"})) {
            Err(OAuthError::UserInfoFailed(_)) => {}
            other => panic!("expected UserInfoFailed, got {:?}", other),
        }
    }
}
