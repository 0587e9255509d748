//! Wallet HTTP handlers
//!
//! Balance, ledger, top-up and payout requests for the signed-in user.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::{AuthenticatedUser, DriverUser};
use crate::state::AppState;
use crate::wallet::{
    BalanceResponse, ListRequestsQuery, PayoutRequest, PayoutRequestBody, TopUpRequest,
    TopUpRequestBody, WalletTransaction,
};

/// GET /wallet
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.wallet_service.balance(user.user_id).await?;
    Ok(Json(BalanceResponse {
        user_id: user.user_id,
        balance,
    }))
}

/// GET /wallet/transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    Ok(Json(
        state.wallet_service.transactions(user.user_id).await?,
    ))
}

/// POST /wallet/top-ups
pub async fn request_top_up(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<TopUpRequestBody>,
) -> Result<(StatusCode, Json<TopUpRequest>), ApiError> {
    req.validate()?;
    let request = state
        .wallet_service
        .request_top_up(user.user_id, req.amount, req.note)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /wallet/top-ups
pub async fn list_my_top_ups(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<TopUpRequest>>, ApiError> {
    Ok(Json(
        state
            .wallet_service
            .list_top_ups(Some(user.user_id), query.status)
            .await?,
    ))
}

/// POST /wallet/payouts - Drivers cash out earnings
pub async fn request_payout(
    State(state): State<AppState>,
    DriverUser(driver): DriverUser,
    Json(req): Json<PayoutRequestBody>,
) -> Result<(StatusCode, Json<PayoutRequest>), ApiError> {
    req.validate()?;
    let request = state
        .wallet_service
        .request_payout(driver.user_id, req.amount, req.destination)
        .await?;
    Ok((StatusCode::CREATED, Json(request)))
}

/// GET /wallet/payouts
pub async fn list_my_payouts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListRequestsQuery>,
) -> Result<Json<Vec<PayoutRequest>>, ApiError> {
    Ok(Json(
        state
            .wallet_service
            .list_payouts(Some(user.user_id), query.status)
            .await?,
    ))
}
