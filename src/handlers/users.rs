//! Profile, presence and document HTTP handlers for the signed-in user

use axum::{extract::State, Json};

use crate::error::ApiError;
use crate::handlers::{AuthenticatedUser, DriverUser};
use crate::models::{
    DeviceTokenRequest, DriverDocument, GeoPoint, SetOnlineRequest, UpdateProfileRequest,
    UploadDocumentRequest, UserResponse,
};
use crate::state::AppState;

/// GET /me
pub async fn get_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(state.user_service.get_profile(user.user_id).await?))
}

/// PATCH /me
pub async fn update_me(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(
        state.user_service.update_profile(user.user_id, req).await?,
    ))
}

/// PUT /me/device-token - Register (or clear) the push token
pub async fn set_device_token(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<DeviceTokenRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let profile = state
        .user_service
        .register_device_token(user.user_id, req.token)
        .await?;
    Ok(Json(profile))
}

/// PUT /me/location - Report the driver's current position
pub async fn update_location(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Json(point): Json<GeoPoint>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(
        state
            .user_service
            .update_location(driver.user_id, point)
            .await?,
    ))
}

/// POST /me/location/denied - The device refused location access
pub async fn location_denied(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(
        state
            .user_service
            .report_location_denied(driver.user_id)
            .await?,
    ))
}

/// PUT /me/online
pub async fn set_online(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Json(req): Json<SetOnlineRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    Ok(Json(
        state
            .user_service
            .set_online(driver.user_id, req.online)
            .await?,
    ))
}

/// GET /me/documents
pub async fn list_my_documents(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
) -> Result<Json<Vec<DriverDocument>>, ApiError> {
    Ok(Json(
        state.user_service.list_documents(driver.user_id).await?,
    ))
}

/// PUT /me/documents - Submit or replace a document; it goes back to review
pub async fn upload_document(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Json(req): Json<UploadDocumentRequest>,
) -> Result<Json<DriverDocument>, ApiError> {
    Ok(Json(
        state
            .user_service
            .upload_document(driver.user_id, req)
            .await?,
    ))
}
