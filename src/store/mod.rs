//! Persistence layer
//!
//! One repository trait per collection, combined into [`Store`]. Services hold
//! an `Arc<dyn Store>` and never see SQL. Every method that changes more than
//! one record, or that guards a write with a condition, is atomic in both
//! implementations:
//!
//! - [`PgStore`] uses a transaction with row locks or a conditional `UPDATE`
//! - [`MemoryStore`] runs each call under a single lock

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::ads::{AdAudience, Advertisement, ListAdsQuery};
use crate::app_config::AppConfig;
use crate::models::{
    ApprovalStatus, DocumentKind, DocumentStatus, DriverDocument, GeoPoint, ListUsersQuery,
    UpdateProfileRequest, User, UserRole,
};
use crate::notifications::Notification;
use crate::ride::{ListRidesQuery, Ride, RideHistoryEntry, RideMessage, RideStatus};
use crate::wallet::{
    PayoutRequest, RequestStatus, Review, Settlement, TopUpRequest, Transfer, WalletTransaction,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Default and maximum page size for listings
pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 200;

pub(crate) fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
}

/// Partial unique index on `rides (driver_id)` over the statuses that hold a driver
pub const ONE_ACTIVE_RIDE_PER_DRIVER: &str = "idx_rides_one_active_per_driver";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// A conditional write found the record changed underneath it
    #[error("{0}")]
    Conflict(String),

    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientFunds {
        available: Decimal,
        requested: Decimal,
    },

    /// The driver is already assigned to another active ride
    #[error("{0}")]
    DriverBusy(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record".to_string()),
            // unique_violation: a concurrent writer got there first
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                if db.constraint() == Some(ONE_ACTIVE_RIDE_PER_DRIVER) {
                    StoreError::DriverBusy("driver already has an active ride".to_string())
                } else {
                    StoreError::Conflict(db.message().to_string())
                }
            }
            other => StoreError::Database(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A guarded ride status change
///
/// Applied only if the stored ride still has `expected_version` and
/// `expected_status`. The history entry, and the driver credit when
/// `settlement` is set, are written in the same atomic step.
#[derive(Debug, Clone)]
pub struct TransitionWrite {
    pub ride: Ride,
    pub expected_version: i64,
    pub expected_status: RideStatus,
    pub entry: RideHistoryEntry,
    pub settlement: Option<Settlement>,
}

#[async_trait]
pub trait RideRepo {
    async fn insert_ride(&self, ride: &Ride, entry: &RideHistoryEntry) -> StoreResult<Ride>;

    async fn get_ride(&self, id: Uuid) -> StoreResult<Ride>;

    /// Newest first
    async fn list_rides(&self, query: &ListRidesQuery) -> StoreResult<Vec<Ride>>;

    async fn apply_transition(&self, write: TransitionWrite) -> StoreResult<Ride>;

    /// Oldest first
    async fn ride_history(&self, ride_id: Uuid) -> StoreResult<Vec<RideHistoryEntry>>;

    async fn insert_message(&self, message: &RideMessage) -> StoreResult<RideMessage>;

    /// Oldest first
    async fn list_messages(&self, ride_id: Uuid) -> StoreResult<Vec<RideMessage>>;
}

#[async_trait]
pub trait UserRepo {
    async fn get_user(&self, id: Uuid) -> StoreResult<User>;

    /// Insert `user` unless a user with its id exists; returns the stored record
    async fn ensure_user(&self, user: &User) -> StoreResult<User>;

    async fn update_profile(&self, id: Uuid, update: &UpdateProfileRequest) -> StoreResult<User>;

    async fn list_users(&self, query: &ListUsersQuery) -> StoreResult<Vec<User>>;

    async fn set_approval_status(&self, id: Uuid, status: ApprovalStatus) -> StoreResult<User>;

    async fn set_online(&self, id: Uuid, online: bool) -> StoreResult<User>;

    async fn update_location(
        &self,
        id: Uuid,
        point: GeoPoint,
        at: DateTime<Utc>,
    ) -> StoreResult<User>;

    async fn set_device_token(&self, id: Uuid, token: Option<String>) -> StoreResult<User>;

    /// `(user_id, token)` for every user with a registered device
    async fn users_with_device_token(
        &self,
        role: Option<UserRole>,
    ) -> StoreResult<Vec<(Uuid, String)>>;

    /// Flip online drivers whose last position predates `cutoff` offline
    async fn mark_stale_drivers_offline(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>>;

    /// Insert or replace the document of this kind; always stored as submitted
    async fn upsert_document(&self, document: &DriverDocument) -> StoreResult<DriverDocument>;

    async fn list_documents(&self, user_id: Uuid) -> StoreResult<Vec<DriverDocument>>;

    async fn set_document_status(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        status: DocumentStatus,
        reviewer: Uuid,
    ) -> StoreResult<DriverDocument>;
}

#[async_trait]
pub trait WalletRepo {
    async fn insert_top_up(&self, request: &TopUpRequest) -> StoreResult<TopUpRequest>;

    async fn get_top_up(&self, id: Uuid) -> StoreResult<TopUpRequest>;

    async fn list_top_ups(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<TopUpRequest>>;

    /// Approve (credit + ledger row) or reject a pending request
    async fn resolve_top_up(
        &self,
        id: Uuid,
        review: Review,
        reviewer: Uuid,
        note: Option<String>,
    ) -> StoreResult<TopUpRequest>;

    async fn insert_payout(&self, request: &PayoutRequest) -> StoreResult<PayoutRequest>;

    async fn get_payout(&self, id: Uuid) -> StoreResult<PayoutRequest>;

    async fn list_payouts(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<PayoutRequest>>;

    /// Approve (debit with balance check + ledger row) or reject a pending request
    async fn resolve_payout(
        &self,
        id: Uuid,
        review: Review,
        reviewer: Uuid,
        note: Option<String>,
    ) -> StoreResult<PayoutRequest>;

    /// Move `amount` between two balances, failing with no changes when short
    async fn transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> StoreResult<Transfer>;

    /// Newest first
    async fn list_transactions(&self, user_id: Uuid) -> StoreResult<Vec<WalletTransaction>>;
}

#[async_trait]
pub trait AdRepo {
    async fn insert_ad(&self, ad: &Advertisement) -> StoreResult<Advertisement>;

    async fn get_ad(&self, id: Uuid) -> StoreResult<Advertisement>;

    /// Overwrite content fields; activation goes through `set_ad_active`
    async fn update_ad(&self, ad: &Advertisement) -> StoreResult<Advertisement>;

    async fn delete_ad(&self, id: Uuid) -> StoreResult<()>;

    async fn list_ads(&self, query: &ListAdsQuery) -> StoreResult<Vec<Advertisement>>;

    /// Activating an ad deactivates every other active ad of its audience
    async fn set_ad_active(&self, id: Uuid, active: bool) -> StoreResult<Advertisement>;

    async fn active_ads_for(&self, audience: AdAudience) -> StoreResult<Vec<Advertisement>>;
}

#[async_trait]
pub trait ConfigRepo {
    async fn load_config(&self) -> StoreResult<Option<AppConfig>>;

    /// Store `config` if the current version is `expected_version` (0 when none
    /// exists yet)
    async fn save_config(&self, config: &AppConfig, expected_version: i64)
        -> StoreResult<AppConfig>;
}

#[async_trait]
pub trait NotificationRepo {
    async fn insert_notification(&self, notification: &Notification)
        -> StoreResult<Notification>;

    /// The user's own notifications plus broadcasts to their role, newest first
    async fn list_notifications(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> StoreResult<Vec<Notification>>;

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<Notification>;
}

#[async_trait]
pub trait Store:
    RideRepo + UserRepo + WalletRepo + AdRepo + ConfigRepo + NotificationRepo + Send + Sync
{
    async fn health_check(&self) -> StoreResult<()>;

    /// Short name for logs and the health endpoint
    fn backend(&self) -> &'static str;
}
