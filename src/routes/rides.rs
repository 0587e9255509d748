//! Ride routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::rides;
use crate::state::AppState;

/// Booking, dispatch, trip progress and in-ride chat
pub fn ride_routes() -> Router<AppState> {
    Router::new()
        .route("/rides", post(rides::create_ride).get(rides::list_my_rides))
        .route("/rides/bookable", get(rides::list_bookable))
        .route("/rides/:id", get(rides::get_ride))
        .route("/rides/:id/vehicle", post(rides::select_vehicle))
        .route("/rides/:id/accept", post(rides::accept_ride))
        .route("/rides/:id/enroute", post(rides::start_enroute))
        .route("/rides/:id/arrive", post(rides::arrive))
        .route("/rides/:id/start", post(rides::start_trip))
        .route("/rides/:id/complete", post(rides::complete_ride))
        .route("/rides/:id/cancel", post(rides::cancel_ride))
        .route("/rides/:id/history", get(rides::ride_history))
        .route(
            "/rides/:id/messages",
            get(rides::list_messages).post(rides::post_message),
        )
}
