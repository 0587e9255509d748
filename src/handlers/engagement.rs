//! Ads, notifications and runtime configuration as seen by app users

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::ads::Advertisement;
use crate::app_config::AppConfig;
use crate::error::ApiError;
use crate::handlers::AuthenticatedUser;
use crate::notifications::Notification;
use crate::state::AppState;

/// GET /ads - Active ads for the caller's role
pub async fn active_ads(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Advertisement>>, ApiError> {
    Ok(Json(state.ad_service.active_for_role(user.role).await?))
}

/// GET /notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Notification>>, ApiError> {
    Ok(Json(
        state
            .notification_service
            .list_for_user(user.user_id, user.role)
            .await?,
    ))
}

/// POST /notifications/:id/read
pub async fn mark_notification_read(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, ApiError> {
    Ok(Json(
        state
            .notification_service
            .mark_read(id, user.user_id)
            .await?,
    ))
}

/// GET /config - Fares, commission and feature toggles clients render against
pub async fn get_config(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Json<AppConfig> {
    Json(state.app_config.current().await)
}
