//! Ads, notifications and config routes for app users

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::engagement;
use crate::state::AppState;

pub fn engagement_routes() -> Router<AppState> {
    Router::new()
        .route("/ads", get(engagement::active_ads))
        .route("/notifications", get(engagement::list_notifications))
        .route(
            "/notifications/:id/read",
            post(engagement::mark_notification_read),
        )
        .route("/config", get(engagement::get_config))
}
