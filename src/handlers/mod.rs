//! API handlers for the Rideway backend

pub mod admin;
pub mod engagement;
pub mod rides;
pub mod users;
pub mod wallet;

// Re-export the extractors for handler use
pub use crate::middleware::auth::{AdminUser, AuthenticatedUser, DriverUser};
