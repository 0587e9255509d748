//! Wallet operations
//!
//! Every balance change is a single atomic store call that also appends the
//! ledger row. The checks here only reject requests that could never succeed;
//! the store re-checks balances under its lock.

use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::{
    PayoutRequest, RequestStatus, Review, TopUpRequest, Transfer, WalletTransaction,
};
use crate::error::ApiError;
use crate::store::{Store, StoreError, UserRepo, WalletRepo};

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer to yourself")]
    SelfTransfer,

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<WalletError> for ApiError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InvalidAmount(_) | WalletError::SelfTransfer => {
                ApiError::ValidationError(err.to_string())
            }
            WalletError::InsufficientFunds { .. } => ApiError::UnprocessableEntity(err.to_string()),
            WalletError::Store(e) => e.into(),
        }
    }
}

/// Positive, and no finer than cents
fn check_amount(amount: Decimal) -> Result<(), WalletError> {
    if amount <= Decimal::ZERO {
        return Err(WalletError::InvalidAmount(format!(
            "amount must be positive, got {}",
            amount
        )));
    }
    if amount.round_dp(2) != amount {
        return Err(WalletError::InvalidAmount(format!(
            "amount must have at most two decimal places, got {}",
            amount
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn Store>,
}

impl WalletService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<Decimal, WalletError> {
        Ok(self.store.get_user(user_id).await?.wallet_balance)
    }

    pub async fn transactions(&self, user_id: Uuid) -> Result<Vec<WalletTransaction>, WalletError> {
        Ok(self.store.list_transactions(user_id).await?)
    }

    pub async fn request_top_up(
        &self,
        user_id: Uuid,
        amount: Decimal,
        note: Option<String>,
    ) -> Result<TopUpRequest, WalletError> {
        check_amount(amount)?;
        let request = self
            .store
            .insert_top_up(&TopUpRequest::new(user_id, amount, note))
            .await?;

        tracing::info!(
            request_id = %request.id,
            user_id = %user_id,
            amount = %amount,
            "Top-up requested"
        );

        Ok(request)
    }

    pub async fn review_top_up(
        &self,
        admin_id: Uuid,
        request_id: Uuid,
        review: Review,
        note: Option<String>,
    ) -> Result<TopUpRequest, WalletError> {
        let resolved = self
            .store
            .resolve_top_up(request_id, review, admin_id, note)
            .await?;

        tracing::info!(
            request_id = %request_id,
            admin_id = %admin_id,
            status = ?resolved.status,
            "Top-up reviewed"
        );

        Ok(resolved)
    }

    pub async fn list_top_ups(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<TopUpRequest>, WalletError> {
        Ok(self.store.list_top_ups(user_id, status).await?)
    }

    pub async fn request_payout(
        &self,
        user_id: Uuid,
        amount: Decimal,
        destination: String,
    ) -> Result<PayoutRequest, WalletError> {
        check_amount(amount)?;

        let available = self.balance(user_id).await?;
        if amount > available {
            return Err(WalletError::InsufficientFunds {
                available,
                requested: amount,
            });
        }

        let request = self
            .store
            .insert_payout(&PayoutRequest::new(user_id, amount, destination))
            .await?;

        tracing::info!(
            request_id = %request.id,
            user_id = %user_id,
            amount = %amount,
            "Payout requested"
        );

        Ok(request)
    }

    pub async fn review_payout(
        &self,
        admin_id: Uuid,
        request_id: Uuid,
        review: Review,
        note: Option<String>,
    ) -> Result<PayoutRequest, WalletError> {
        let resolved = self
            .store
            .resolve_payout(request_id, review, admin_id, note)
            .await
            .map_err(|e| match e {
                StoreError::InsufficientFunds {
                    available,
                    requested,
                } => WalletError::InsufficientFunds {
                    available,
                    requested,
                },
                other => other.into(),
            })?;

        tracing::info!(
            request_id = %request_id,
            admin_id = %admin_id,
            status = ?resolved.status,
            "Payout reviewed"
        );

        Ok(resolved)
    }

    pub async fn list_payouts(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> Result<Vec<PayoutRequest>, WalletError> {
        Ok(self.store.list_payouts(user_id, status).await?)
    }

    /// Move `amount` from the admin's own balance to `recipient_id`
    pub async fn manual_top_up(
        &self,
        admin_id: Uuid,
        recipient_id: Uuid,
        amount: Decimal,
    ) -> Result<Transfer, WalletError> {
        check_amount(amount)?;
        if admin_id == recipient_id {
            return Err(WalletError::SelfTransfer);
        }

        let transfer = self
            .store
            .transfer(admin_id, recipient_id, amount)
            .await
            .map_err(|e| match e {
                StoreError::InsufficientFunds {
                    available,
                    requested,
                } => WalletError::InsufficientFunds {
                    available,
                    requested,
                },
                other => other.into(),
            })?;

        tracing::info!(
            admin_id = %admin_id,
            recipient_id = %recipient_id,
            amount = %amount,
            "Manual top-up completed"
        );

        Ok(transfer)
    }
}
