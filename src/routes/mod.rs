//! Route definitions for the Rideway API

mod admin;
mod engagement;
mod rides;
mod users;
mod wallet;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;
use crate::websocket;

pub use admin::admin_routes;
pub use engagement::engagement_routes;
pub use rides::ride_routes;
pub use users::user_routes;
pub use wallet::wallet_routes;

/// Every API route, without middleware layers
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/ws", get(websocket::ws_handler))
        .merge(ride_routes())
        .merge(user_routes())
        .merge(wallet_routes())
        .merge(engagement_routes())
        .merge(admin_routes())
}

async fn root() -> &'static str {
    "Rideway API Server"
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub store: String,
    pub database: String,
    pub connected_clients: usize,
    pub version: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match state.store.health_check().await {
        Ok(()) => ("healthy", "connected".to_string()),
        Err(e) => ("unhealthy", format!("error: {}", e)),
    };

    Json(HealthResponse {
        status: status.to_string(),
        store: state.store.backend().to_string(),
        database,
        connected_clients: state.ws_state.connected_clients().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
