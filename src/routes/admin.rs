//! Admin console routes

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::admin;
use crate::state::AppState;

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/rides", get(admin::list_rides))
        .route("/admin/rides/:id/status", post(admin::force_ride_status))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id/approval", put(admin::set_approval))
        .route("/admin/users/:id/documents", get(admin::list_user_documents))
        .route(
            "/admin/users/:id/documents/:kind",
            put(admin::review_document),
        )
        .route("/admin/top-ups", get(admin::list_top_ups))
        .route("/admin/top-ups/:id/approve", post(admin::approve_top_up))
        .route("/admin/top-ups/:id/reject", post(admin::reject_top_up))
        .route("/admin/payouts", get(admin::list_payouts))
        .route("/admin/payouts/:id/approve", post(admin::approve_payout))
        .route("/admin/payouts/:id/reject", post(admin::reject_payout))
        .route("/admin/wallet/transfer", post(admin::manual_top_up))
        .route("/admin/ads", get(admin::list_ads).post(admin::create_ad))
        .route(
            "/admin/ads/:id",
            get(admin::get_ad)
                .put(admin::update_ad)
                .delete(admin::delete_ad),
        )
        .route("/admin/ads/:id/active", put(admin::set_ad_active))
        .route("/admin/config", put(admin::update_config))
        .route("/admin/notifications/broadcast", post(admin::broadcast))
}
