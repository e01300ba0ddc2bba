//! # Auth Module
//!
//! This module handles session authentication:
//! - Credential login and token pair issuance
//! - Access token refresh and logout
//! - AuthedUser extractor for protected routes

pub mod extractors;
pub mod handlers;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

pub use extractors::AuthedUser;
pub use models::User;
pub use routes::auth_routes;
