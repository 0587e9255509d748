//! Middleware for the Rideway API
//!
//! Request tracing, rate limiting, security headers and the authentication
//! extractors.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

use axum::http::HeaderMap;

pub use auth::{AdminUser, AuthenticatedUser, DriverUser};
pub use rate_limiter::{rate_limit_layer, RateLimiter};
pub use security::{hsts_header, security_headers};
pub use self::tracing::{request_tracing, REQUEST_ID};

/// Best-effort client address from proxy headers
pub(crate) fn client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    forwarded.or_else(|| {
        headers
            .get("x-real-ip")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.trim().to_string())
    })
}
