//! # OAuth Module
//!
//! Redirect-based login against external identity providers:
//! - CSRF state round trip
//! - Authorization code exchange and userinfo normalization
//! - Account creation/linking on first provider login

pub mod handlers;
pub mod models;
pub mod routes;

pub use models::OAuthUser;
pub use routes::oauth_routes;
