// src/main.rs
use axum::{extract::Extension, routing::get, Json, Router};
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::{env, net::SocketAddr, str::FromStr, sync::Arc};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod common;
mod oauth;
mod rbac;
mod services;
mod users;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use common::AppState;
use services::{
    AuthService, InMemoryStateStore, OAuthProviders, PolicyService, RbacService,
    RefreshTokenService, StateTokenService, TokenConfig, TokenService, UserService,
};

/// GET /health - liveness probe
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://auth_api.db".to_string());
    let token_config = TokenConfig::from_env();

    info!(
        access_ttl_minutes = token_config.access_token_ttl.num_minutes(),
        refresh_ttl_days = token_config.refresh_token_ttl.num_days(),
        "Token lifetimes configured"
    );

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder().build()?;

    let tokens = Arc::new(TokenService::new(&token_config));
    info!("TokenService initialized");

    let refresh_tokens = Arc::new(RefreshTokenService::new(
        pool.clone(),
        tokens.clone(),
        token_config.refresh_token_ttl,
    ));
    info!("RefreshTokenService initialized");

    let auth_service = Arc::new(
        AuthService::new(pool.clone(), tokens.clone(), refresh_tokens.clone())
            .map_err(|e| anyhow::anyhow!("failed to initialize auth service: {}", e))?,
    );
    info!("AuthService initialized");

    let user_service = Arc::new(UserService::new(pool.clone()));
    info!("UserService initialized");

    let state_tokens = Arc::new(StateTokenService::new(Arc::new(InMemoryStateStore::new())));
    info!("StateTokenService initialized");

    let rbac_service = Arc::new(RbacService::new(pool.clone()));
    info!("RbacService initialized");

    let policy_service = Arc::new(
        PolicyService::new()
            .await
            .map_err(|e| anyhow::anyhow!("failed to initialize policy engine: {}", e))?,
    );
    policy_service
        .sync_from_relational(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("failed to sync policies: {}", e))?;
    info!("PolicyService initialized");

    let oauth_providers = Arc::new(OAuthProviders::from_env(http_client));

    // ========================================================================
    // BACKGROUND SWEEPERS
    // ========================================================================

    StateTokenService::start_cleanup_task(state_tokens.clone());
    info!("State token cleanup task started");

    RefreshTokenService::start_sweep_task(refresh_tokens.clone());
    info!("Refresh token sweep task started");

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let app_state = AppState {
        refresh_tokens,
        auth: auth_service,
        users: user_service,
        state_tokens,
        rbac: rbac_service,
        policy: policy_service,
        oauth: oauth_providers,
    };

    let shared = Arc::new(RwLock::new(app_state));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        // ====================================================================
        // SESSION ROUTES (login, refresh, logout)
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // PROVIDER LOGIN ROUTES (redirect-based flows)
        // ====================================================================
        .merge(oauth::oauth_routes())
        // ====================================================================
        // USER ROUTES (registration, admin CRUD)
        // ====================================================================
        .merge(users::users_routes())
        // ====================================================================
        // AUTHORIZATION ROUTES (relational and policy-engine admin)
        // ====================================================================
        .merge(rbac::rbac_routes())
        .merge(rbac::policy_routes())
        .route("/health", get(health))
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(Extension(shared.clone()))
        .layer({
            let cors_origins = env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "http://localhost:3000,http://localhost:5173".to_string());

            let origins: Vec<axum::http::HeaderValue> = cors_origins
                .split(',')
                .filter_map(|origin| origin.trim().parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([
                    axum::http::header::CONTENT_TYPE,
                    axum::http::header::AUTHORIZATION,
                ])
                .allow_credentials(true)
        })
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
