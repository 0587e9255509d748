//! Wallet ledger, top-up and payout models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Why a balance moved
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "wallet_transaction_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    RideEarning,
    TopUp,
    Payout,
    ManualTopUpDebit,
    ManualTopUpCredit,
}

/// Append-only ledger row; `amount` is signed
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct WalletTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub kind: TransactionKind,
    /// Ride, request or counterparty the movement belongs to
    pub reference_id: Option<Uuid>,
    pub balance_after: Decimal,
    pub created_at: DateTime<Utc>,
}

impl WalletTransaction {
    pub fn new(
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        reference_id: Option<Uuid>,
        balance_after: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            kind,
            reference_id,
            balance_after,
            created_at: Utc::now(),
        }
    }
}

/// Review state shared by top-up and payout requests
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct TopUpRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    pub status: RequestStatus,
    pub note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TopUpRequest {
    pub fn new(user_id: Uuid, amount: Decimal, note: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            status: RequestStatus::Pending,
            note,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct PayoutRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: Decimal,
    /// Free text, e.g. a bank account or UPI handle
    pub destination: String,
    pub status: RequestStatus,
    pub note: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRequest {
    pub fn new(user_id: Uuid, amount: Decimal, destination: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            amount,
            destination,
            status: RequestStatus::Pending,
            note: None,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of an admin review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Approve,
    Reject,
}

/// Result of a balance-to-balance transfer
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Transfer {
    pub debit: WalletTransaction,
    pub credit: WalletTransaction,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Validate)]
pub struct TopUpRequestBody {
    pub amount: Decimal,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PayoutRequestBody {
    pub amount: Decimal,
    #[validate(length(min = 3, max = 200))]
    pub destination: String,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct ReviewRequestBody {
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualTopUpBody {
    pub recipient_id: Uuid,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize, Default)]
pub struct ListRequestsQuery {
    pub status: Option<RequestStatus>,
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub user_id: Uuid,
    pub balance: Decimal,
}
