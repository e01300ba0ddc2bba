// Application state shared across all modules

use std::sync::Arc;

use crate::services::{
    AuthService, OAuthProviders, PolicyService, RbacService, RefreshTokenService,
    StateTokenService, UserService,
};

/// Application state containing the services and configuration shared by
/// every handler. Persistence is reached through the services, which each
/// hold their own handle to the pool.
#[derive(Clone)]
pub struct AppState {
    pub refresh_tokens: Arc<RefreshTokenService>,
    pub auth: Arc<AuthService>,
    pub users: Arc<UserService>,
    pub state_tokens: Arc<StateTokenService>,
    pub rbac: Arc<RbacService>,
    pub policy: Arc<PolicyService>,
    pub oauth: Arc<OAuthProviders>,
}
