//! Authentication module for Rideway
//!
//! Sign-in happens at the external identity service. Rideway verifies the
//! HS256 identity tokens it issues and resolves them to user records.

mod jwt;
mod service;

pub use jwt::{issue_token, verify_token, Claims, JwtError};
pub use service::{AuthError, AuthService, Identity};
