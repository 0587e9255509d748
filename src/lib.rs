//! Rideway Backend Library
//!
//! Ride-hailing backend: the ride lifecycle state machine, dispatch, driver
//! onboarding, wallets, ads, runtime configuration and push notifications.

pub mod ads;
pub mod app_config;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod notifications;
pub mod ride;
pub mod routes;
pub mod state;
pub mod store;
pub mod users;
pub mod wallet;
pub mod websocket;

use axum::Router;

use middleware::RateLimiter;
use state::AppState;

/// The API router with its request middleware applied
///
/// CORS and HSTS depend on deployment and are layered on by the binary.
pub fn app(state: AppState, rate_limiter: RateLimiter) -> Router {
    routes::router()
        .with_state(state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            middleware::rate_limit_layer(limiter)(req, next)
        }))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
}
