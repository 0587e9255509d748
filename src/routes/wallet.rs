//! Wallet routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::wallet;
use crate::state::AppState;

/// Balance, ledger and the user's top-up / payout requests
pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/wallet", get(wallet::get_balance))
        .route("/wallet/transactions", get(wallet::list_transactions))
        .route(
            "/wallet/top-ups",
            post(wallet::request_top_up).get(wallet::list_my_top_ups),
        )
        .route(
            "/wallet/payouts",
            post(wallet::request_payout).get(wallet::list_my_payouts),
        )
}
