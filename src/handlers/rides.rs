//! Ride HTTP handlers
//!
//! Booking, dispatch and trip progress. Role and party checks live in the
//! ride service; these handlers only unpack requests.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::{AuthenticatedUser, DriverUser};
use crate::ride::{
    CancelRideRequest, CompleteRideRequest, CreateRideRequest, PostMessageRequest, Ride,
    RideHistoryEntry, RideMessage, RideStatus, SelectVehicleRequest,
};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MyRidesQuery {
    pub status: Option<RideStatus>,
}

/// POST /rides - Open a ride request
pub async fn create_ride(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<Ride>), ApiError> {
    let ride = state.ride_service.request_ride(user.actor(), req).await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

/// GET /rides - The caller's rides, newest first
pub async fn list_my_rides(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<MyRidesQuery>,
) -> Result<Json<Vec<Ride>>, ApiError> {
    let rides = state
        .ride_service
        .list_for_user(&user.actor(), query.status)
        .await?;
    Ok(Json(rides))
}

/// GET /rides/bookable - Rides waiting for a driver
pub async fn list_bookable(
    State(state): State<AppState>,
    DriverUser(_driver): DriverUser,
) -> Result<Json<Vec<Ride>>, ApiError> {
    Ok(Json(state.ride_service.bookable_rides().await?))
}

/// GET /rides/:id
pub async fn get_ride(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    Ok(Json(state.ride_service.get_ride(&user.actor(), id).await?))
}

/// POST /rides/:id/vehicle - Choose a vehicle class; books the ride
pub async fn select_vehicle(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SelectVehicleRequest>,
) -> Result<Json<Ride>, ApiError> {
    let ride = state
        .ride_service
        .select_vehicle(user.actor(), id, req.vehicle_class)
        .await?;
    Ok(Json(ride))
}

/// POST /rides/:id/accept
pub async fn accept_ride(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    Ok(Json(state.ride_service.accept(driver.actor(), id).await?))
}

/// POST /rides/:id/enroute
pub async fn start_enroute(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    Ok(Json(state.ride_service.start_enroute(driver.actor(), id).await?))
}

/// POST /rides/:id/arrive
pub async fn arrive(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    Ok(Json(state.ride_service.arrive(driver.actor(), id).await?))
}

/// POST /rides/:id/start
pub async fn start_trip(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Ride>, ApiError> {
    Ok(Json(state.ride_service.start_trip(driver.actor(), id).await?))
}

/// POST /rides/:id/complete - Finish the trip and settle the fare
pub async fn complete_ride(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CompleteRideRequest>>,
) -> Result<Json<Ride>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    let ride = state
        .ride_service
        .complete(driver.actor(), id, req.tip)
        .await?;
    Ok(Json(ride))
}

/// POST /rides/:id/cancel
pub async fn cancel_ride(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    body: Option<Json<CancelRideRequest>>,
) -> Result<Json<Ride>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    req.validate()?;
    let ride = state
        .ride_service
        .cancel(user.actor(), id, req.reason)
        .await?;
    Ok(Json(ride))
}

/// GET /rides/:id/history
pub async fn ride_history(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RideHistoryEntry>>, ApiError> {
    Ok(Json(state.ride_service.history(&user.actor(), id).await?))
}

/// GET /rides/:id/messages
pub async fn list_messages(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<RideMessage>>, ApiError> {
    Ok(Json(
        state.ride_service.list_messages(&user.actor(), id).await?,
    ))
}

/// POST /rides/:id/messages
pub async fn post_message(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(req): Json<PostMessageRequest>,
) -> Result<(StatusCode, Json<RideMessage>), ApiError> {
    req.validate()?;
    let message = state
        .ride_service
        .post_message(user.actor(), id, req.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
