//! # RBAC Module
//!
//! Authorization administration and enforcement:
//! - Role/permission CRUD and grant management (relational engine)
//! - Casbin policy and grouping administration (policy engine)
//! - Route guards for permission and role checks

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;

pub use models::{Permission, Role};
pub use routes::{policy_routes, rbac_routes};
