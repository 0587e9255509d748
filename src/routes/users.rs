//! Profile and presence routes for the signed-in user

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::handlers::users;
use crate::state::AppState;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(users::get_me).patch(users::update_me))
        .route("/me/device-token", put(users::set_device_token))
        .route("/me/location", put(users::update_location))
        .route("/me/location/denied", post(users::location_denied))
        .route("/me/online", put(users::set_online))
        .route(
            "/me/documents",
            get(users::list_my_documents).put(users::upload_document),
        )
}
