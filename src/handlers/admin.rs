//! Admin console HTTP handlers
//!
//! Every handler here requires the `admin` role via [`AdminUser`].

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::ads::{Advertisement, CreateAdRequest, ListAdsQuery, SetActiveRequest, UpdateAdRequest};
use crate::app_config::{AppConfig, UpdateAppConfigRequest};
use crate::error::ApiError;
use crate::handlers::AdminUser;
use crate::models::{
    DocumentKind, DriverDocument, ListUsersQuery, ReviewDocumentRequest, SetApprovalRequest,
    UserResponse,
};
use crate::notifications::{BroadcastRequest, BroadcastSummary};
use crate::ride::{ForceStatusRequest, ListRidesQuery, Ride};
use crate::state::AppState;
use crate::wallet::{
    ListRequestsQuery, ManualTopUpBody, PayoutRequest, Review, ReviewRequestBody, TopUpRequest,
    Transfer,
};

// ----------------------------------------------------------------------------
// Rides
// ----------------------------------------------------------------------------

/// GET /admin/rides
pub async fn list_rides(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListRidesQuery>,
) -> Result<Json<Vec<Ride>>, ApiError> {
    Ok(Json(state.ride_service.list_rides(query).await?))
}

/// POST /admin/rides/:id/status - Override a ride's status
pub async fn force_ride_status(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ForceStatusRequest>,
) -> Result<Json<Ride>, ApiError> {
    req.validate()?;
    let ride = state
        .ride_service
        .force_status(admin.actor(), id, req.status, req.note)
        .await?;
    Ok(Json(ride))
}

// ----------------------------------------------------------------------------
// Users and driver onboarding
// ----------------------------------------------------------------------------

/// GET /admin/users
pub async fn list_users(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    Ok(Json(state.user_service.list_users(query).await?))
}

/// PUT /admin/users/:id/approval
pub async fn set_approval(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SetApprovalRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let user = state
        .user_service
        .set_approval_status(admin.user_id, id, req.status)
        .await?;
    Ok(Json(user))
}

/// GET /admin/users/:id/documents
pub async fn list_user_documents(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<DriverDocument>>, ApiError> {
    Ok(Json(state.user_service.list_documents(id).await?))
}

/// PUT /admin/users/:id/documents/:kind
pub async fn review_document(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path((id, kind)): Path<(Uuid, DocumentKind)>,
    Json(req): Json<ReviewDocumentRequest>,
) -> Result<Json<DriverDocument>, ApiError> {
    let document = state
        .user_service
        .review_document(admin.user_id, id, kind, req.status)
        .await?;
    Ok(Json(document))
}

// ----------------------------------------------------------------------------
// Wallet
// ----------------------------------------------------------------------------

/// GET /admin/top-ups
pub async fn list_top_ups(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<TopUpRequest>>, ApiError> {
    Ok(Json(
        state.wallet_service.list_top_ups(None, query.status).await?,
    ))
}

async fn review_top_up(
    state: AppState,
    admin: AdminUser,
    id: Uuid,
    review: Review,
    body: Option<Json<ReviewRequestBody>>,
) -> Result<Json<TopUpRequest>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    req.validate()?;
    let request = state
        .wallet_service
        .review_top_up(admin.0.user_id, id, review, req.note)
        .await?;
    Ok(Json(request))
}

/// POST /admin/top-ups/:id/approve
pub async fn approve_top_up(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequestBody>>,
) -> Result<Json<TopUpRequest>, ApiError> {
    review_top_up(state, admin, id, Review::Approve, body).await
}

/// POST /admin/top-ups/:id/reject
pub async fn reject_top_up(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequestBody>>,
) -> Result<Json<TopUpRequest>, ApiError> {
    review_top_up(state, admin, id, Review::Reject, body).await
}

/// GET /admin/payouts
pub async fn list_payouts(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<PayoutRequest>>, ApiError> {
    Ok(Json(
        state.wallet_service.list_payouts(None, query.status).await?,
    ))
}

async fn review_payout(
    state: AppState,
    admin: AdminUser,
    id: Uuid,
    review: Review,
    body: Option<Json<ReviewRequestBody>>,
) -> Result<Json<PayoutRequest>, ApiError> {
    let req = body.map(|Json(b)| b).unwrap_or_default();
    req.validate()?;
    let request = state
        .wallet_service
        .review_payout(admin.0.user_id, id, review, req.note)
        .await?;
    Ok(Json(request))
}

/// POST /admin/payouts/:id/approve
pub async fn approve_payout(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequestBody>>,
) -> Result<Json<PayoutRequest>, ApiError> {
    review_payout(state, admin, id, Review::Approve, body).await
}

/// POST /admin/payouts/:id/reject
pub async fn reject_payout(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(id): Path<Uuid>,
    body: Option<Json<ReviewRequestBody>>,
) -> Result<Json<PayoutRequest>, ApiError> {
    review_payout(state, admin, id, Review::Reject, body).await
}

/// POST /admin/wallet/transfer - Move funds from the admin's wallet to a user
pub async fn manual_top_up(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<ManualTopUpBody>,
) -> Result<Json<Transfer>, ApiError> {
    let transfer = state
        .wallet_service
        .manual_top_up(admin.user_id, req.recipient_id, req.amount)
        .await?;
    Ok(Json(transfer))
}

// ----------------------------------------------------------------------------
// Advertisements
// ----------------------------------------------------------------------------

/// GET /admin/ads
pub async fn list_ads(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<ListAdsQuery>,
) -> Result<Json<Vec<Advertisement>>, ApiError> {
    Ok(Json(state.ad_service.list(query).await?))
}

/// POST /admin/ads
pub async fn create_ad(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Json(req): Json<CreateAdRequest>,
) -> Result<(StatusCode, Json<Advertisement>), ApiError> {
    let ad = state.ad_service.create(req).await?;
    Ok((StatusCode::CREATED, Json(ad)))
}

/// GET /admin/ads/:id
pub async fn get_ad(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Advertisement>, ApiError> {
    Ok(Json(state.ad_service.get(id).await?))
}

/// PUT /admin/ads/:id
pub async fn update_ad(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateAdRequest>,
) -> Result<Json<Advertisement>, ApiError> {
    Ok(Json(state.ad_service.update(id, req).await?))
}

/// DELETE /admin/ads/:id
pub async fn delete_ad(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    state.ad_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /admin/ads/:id/active - Activating deactivates the audience's other ads
pub async fn set_ad_active(
    State(state): State<AppState>,
    AdminUser(_admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(req): Json<SetActiveRequest>,
) -> Result<Json<Advertisement>, ApiError> {
    Ok(Json(state.ad_service.set_active(id, req.active).await?))
}

// ----------------------------------------------------------------------------
// Configuration and broadcast
// ----------------------------------------------------------------------------

/// PUT /admin/config - Compare-and-swap on `expected_version`
pub async fn update_config(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<UpdateAppConfigRequest>,
) -> Result<Json<AppConfig>, ApiError> {
    Ok(Json(state.app_config.update(admin.user_id, req).await?))
}

/// POST /admin/notifications/broadcast
pub async fn broadcast(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(req): Json<BroadcastRequest>,
) -> Result<Json<BroadcastSummary>, ApiError> {
    req.validate()?;
    Ok(Json(
        state
            .notification_service
            .broadcast(admin.user_id, req)
            .await?,
    ))
}
