//! # Users Module
//!
//! Registration and administrative user management. The `User` entity
//! itself lives in `auth::models`, shared with the session layer.

pub mod handlers;
pub mod models;
pub mod routes;

pub use routes::users_routes;
