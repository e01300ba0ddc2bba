//! External login provider data models

use serde::{Deserialize, Serialize};

/// Normalized identity returned by a provider's userinfo endpoint.
/// Providers that expose no email (LINE) get a synthesized placeholder
/// address so the account still has a unique login identity.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OAuthUser {
    pub provider_id: String,
    pub provider_name: String,
    pub email: String,
    pub name: String,
    pub picture: Option<String>,
    pub verified: bool,
}

/// Token response from a provider's token endpoint
#[derive(Deserialize, Debug)]
pub struct ProviderToken {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}
