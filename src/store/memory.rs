//! In-process store
//!
//! Holds every collection behind one mutex, so each trait call is atomic with
//! respect to every other. Used by the test suites and by
//! `STORAGE_BACKEND=memory` for local runs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{
    clamp_limit, AdRepo, ConfigRepo, NotificationRepo, RideRepo, Store, StoreError, StoreResult,
    TransitionWrite, UserRepo, WalletRepo,
};
use crate::ads::{AdAudience, Advertisement, ListAdsQuery};
use crate::app_config::AppConfig;
use crate::models::{
    ApprovalStatus, DocumentKind, DocumentStatus, DriverDocument, GeoPoint, ListUsersQuery,
    UpdateProfileRequest, User, UserRole,
};
use crate::notifications::Notification;
use crate::ride::{ListRidesQuery, Ride, RideHistoryEntry, RideMessage};
use crate::wallet::{
    PayoutRequest, RequestStatus, Review, TopUpRequest, TransactionKind, Transfer,
    WalletTransaction,
};

#[derive(Default)]
struct Inner {
    rides: HashMap<Uuid, Ride>,
    history: Vec<RideHistoryEntry>,
    messages: Vec<RideMessage>,
    users: HashMap<Uuid, User>,
    documents: HashMap<(Uuid, DocumentKind), DriverDocument>,
    top_ups: HashMap<Uuid, TopUpRequest>,
    payouts: HashMap<Uuid, PayoutRequest>,
    transactions: Vec<WalletTransaction>,
    ads: HashMap<Uuid, Advertisement>,
    config: Option<AppConfig>,
    notifications: Vec<Notification>,
}

impl Inner {
    fn user_mut(&mut self, id: Uuid) -> StoreResult<&mut User> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("User {}", id)))
    }

    /// Add `amount` (signed) to a balance and append the ledger row
    fn post(
        &mut self,
        user_id: Uuid,
        amount: Decimal,
        kind: TransactionKind,
        reference_id: Option<Uuid>,
    ) -> StoreResult<WalletTransaction> {
        let user = self.user_mut(user_id)?;
        if user.wallet_balance + amount < Decimal::ZERO {
            return Err(StoreError::InsufficientFunds {
                available: user.wallet_balance,
                requested: -amount,
            });
        }
        user.wallet_balance += amount;
        user.updated_at = Utc::now();
        let tx = WalletTransaction::new(user_id, amount, kind, reference_id, user.wallet_balance);
        self.transactions.push(tx.clone());
        Ok(tx)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
}

#[async_trait]
impl RideRepo for MemoryStore {
    async fn insert_ride(&self, ride: &Ride, entry: &RideHistoryEntry) -> StoreResult<Ride> {
        let mut inner = self.inner.lock().await;
        if inner.rides.contains_key(&ride.id) {
            return Err(StoreError::Conflict(format!("Ride {} already exists", ride.id)));
        }
        inner.rides.insert(ride.id, ride.clone());
        inner.history.push(entry.clone());
        Ok(ride.clone())
    }

    async fn get_ride(&self, id: Uuid) -> StoreResult<Ride> {
        let inner = self.inner.lock().await;
        inner
            .rides
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Ride {}", id)))
    }

    async fn list_rides(&self, query: &ListRidesQuery) -> StoreResult<Vec<Ride>> {
        let inner = self.inner.lock().await;
        let mut rides: Vec<Ride> = inner
            .rides
            .values()
            .filter(|r| query.status.map_or(true, |s| r.status == s))
            .filter(|r| query.customer_id.map_or(true, |id| r.customer_id == id))
            .filter(|r| query.driver_id.map_or(true, |id| r.driver_id == Some(id)))
            .cloned()
            .collect();
        newest_first(&mut rides, |r| r.created_at);
        rides.truncate(clamp_limit(query.limit) as usize);
        Ok(rides)
    }

    async fn apply_transition(&self, write: TransitionWrite) -> StoreResult<Ride> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .rides
            .get(&write.ride.id)
            .ok_or_else(|| StoreError::NotFound(format!("Ride {}", write.ride.id)))?;

        if current.version != write.expected_version || current.status != write.expected_status {
            return Err(StoreError::Conflict(format!(
                "Ride {} changed concurrently (now {} at version {})",
                current.id, current.status, current.version
            )));
        }

        // Mirrors the partial unique index on rides (driver_id) in Postgres
        if let Some(driver_id) = write.ride.driver_id.filter(|_| write.ride.status.holds_driver()) {
            if let Some(other) = inner.rides.values().find(|r| {
                r.id != write.ride.id && r.driver_id == Some(driver_id) && r.status.holds_driver()
            }) {
                return Err(StoreError::DriverBusy(format!(
                    "driver {} already has active ride {}",
                    driver_id, other.id
                )));
            }
        }

        if let Some(settlement) = &write.settlement {
            let driver_id = write
                .ride
                .driver_id
                .ok_or_else(|| StoreError::Corrupt(format!("Ride {} has no driver", write.ride.id)))?;
            inner.post(
                driver_id,
                settlement.driver_earnings,
                TransactionKind::RideEarning,
                Some(write.ride.id),
            )?;
        }

        inner.rides.insert(write.ride.id, write.ride.clone());
        inner.history.push(write.entry);
        Ok(write.ride)
    }

    async fn ride_history(&self, ride_id: Uuid) -> StoreResult<Vec<RideHistoryEntry>> {
        let inner = self.inner.lock().await;
        let mut entries: Vec<RideHistoryEntry> = inner
            .history
            .iter()
            .filter(|e| e.ride_id == ride_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.version);
        Ok(entries)
    }

    async fn insert_message(&self, message: &RideMessage) -> StoreResult<RideMessage> {
        let mut inner = self.inner.lock().await;
        inner.messages.push(message.clone());
        Ok(message.clone())
    }

    async fn list_messages(&self, ride_id: Uuid) -> StoreResult<Vec<RideMessage>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .messages
            .iter()
            .filter(|m| m.ride_id == ride_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UserRepo for MemoryStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        let inner = self.inner.lock().await;
        inner
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("User {}", id)))
    }

    async fn ensure_user(&self, user: &User) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .users
            .entry(user.id)
            .or_insert_with(|| user.clone())
            .clone())
    }

    async fn update_profile(&self, id: Uuid, update: &UpdateProfileRequest) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(id)?;
        if let Some(name) = &update.display_name {
            user.display_name = Some(name.clone());
        }
        if let Some(phone) = &update.phone {
            user.phone = Some(phone.clone());
        }
        if let Some(class) = update.vehicle_class {
            user.vehicle_class = Some(class);
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn list_users(&self, query: &ListUsersQuery) -> StoreResult<Vec<User>> {
        let inner = self.inner.lock().await;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| query.role.map_or(true, |r| u.role == r))
            .filter(|u| query.approval_status.map_or(true, |s| u.approval_status == s))
            .filter(|u| query.online.map_or(true, |o| u.is_online == o))
            .cloned()
            .collect();
        newest_first(&mut users, |u| u.created_at);
        users.truncate(clamp_limit(query.limit) as usize);
        Ok(users)
    }

    async fn set_approval_status(&self, id: Uuid, status: ApprovalStatus) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(id)?;
        user.approval_status = status;
        if status != ApprovalStatus::Approved {
            user.is_online = false;
        }
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_online(&self, id: Uuid, online: bool) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(id)?;
        user.is_online = online;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn update_location(
        &self,
        id: Uuid,
        point: GeoPoint,
        at: DateTime<Utc>,
    ) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(id)?;
        user.last_lat = Some(point.lat);
        user.last_lng = Some(point.lng);
        user.location_updated_at = Some(at);
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn set_device_token(&self, id: Uuid, token: Option<String>) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        let user = inner.user_mut(id)?;
        user.device_token = token;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn users_with_device_token(
        &self,
        role: Option<UserRole>,
    ) -> StoreResult<Vec<(Uuid, String)>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .users
            .values()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .filter_map(|u| u.device_token.clone().map(|t| (u.id, t)))
            .collect())
    }

    async fn mark_stale_drivers_offline(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let mut flipped = Vec::new();
        for user in inner.users.values_mut() {
            let stale = user.location_updated_at.map_or(true, |at| at < cutoff);
            if user.role == UserRole::Driver && user.is_online && stale {
                user.is_online = false;
                user.updated_at = now;
                flipped.push(user.id);
            }
        }
        Ok(flipped)
    }

    async fn upsert_document(&self, document: &DriverDocument) -> StoreResult<DriverDocument> {
        let mut inner = self.inner.lock().await;
        let key = (document.user_id, document.kind);
        let created_at = inner
            .documents
            .get(&key)
            .map_or(document.created_at, |d| d.created_at);
        let stored = DriverDocument {
            status: DocumentStatus::Pending,
            reviewed_by: None,
            created_at,
            updated_at: Utc::now(),
            ..document.clone()
        };
        inner.documents.insert(key, stored.clone());
        Ok(stored)
    }

    async fn list_documents(&self, user_id: Uuid) -> StoreResult<Vec<DriverDocument>> {
        let inner = self.inner.lock().await;
        let mut docs: Vec<DriverDocument> = inner
            .documents
            .values()
            .filter(|d| d.user_id == user_id)
            .cloned()
            .collect();
        docs.sort_by_key(|d| d.created_at);
        Ok(docs)
    }

    async fn set_document_status(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        status: DocumentStatus,
        reviewer: Uuid,
    ) -> StoreResult<DriverDocument> {
        let mut inner = self.inner.lock().await;
        let doc = inner
            .documents
            .get_mut(&(user_id, kind))
            .ok_or_else(|| StoreError::NotFound(format!("Document {:?} for user {}", kind, user_id)))?;
        doc.status = status;
        doc.reviewed_by = Some(reviewer);
        doc.updated_at = Utc::now();
        Ok(doc.clone())
    }
}

#[async_trait]
impl WalletRepo for MemoryStore {
    async fn insert_top_up(&self, request: &TopUpRequest) -> StoreResult<TopUpRequest> {
        let mut inner = self.inner.lock().await;
        inner.user_mut(request.user_id)?;
        inner.top_ups.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn get_top_up(&self, id: Uuid) -> StoreResult<TopUpRequest> {
        let inner = self.inner.lock().await;
        inner
            .top_ups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Top-up request {}", id)))
    }

    async fn list_top_ups(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<TopUpRequest>> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<TopUpRequest> = inner
            .top_ups
            .values()
            .filter(|r| user_id.map_or(true, |id| r.user_id == id))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut requests, |r| r.created_at);
        Ok(requests)
    }

    async fn resolve_top_up(
        &self,
        id: Uuid,
        review: Review,
        reviewer: Uuid,
        note: Option<String>,
    ) -> StoreResult<TopUpRequest> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .top_ups
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Top-up request {}", id)))?;
        if request.status != RequestStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "Top-up request {} is already {:?}",
                id, request.status
            )));
        }

        let status = match review {
            Review::Approve => {
                inner.post(
                    request.user_id,
                    request.amount,
                    TransactionKind::TopUp,
                    Some(request.id),
                )?;
                RequestStatus::Completed
            }
            Review::Reject => RequestStatus::Rejected,
        };

        let resolved = TopUpRequest {
            status,
            reviewed_by: Some(reviewer),
            note: note.or(request.note.clone()),
            updated_at: Utc::now(),
            ..request
        };
        inner.top_ups.insert(id, resolved.clone());
        Ok(resolved)
    }

    async fn insert_payout(&self, request: &PayoutRequest) -> StoreResult<PayoutRequest> {
        let mut inner = self.inner.lock().await;
        inner.user_mut(request.user_id)?;
        inner.payouts.insert(request.id, request.clone());
        Ok(request.clone())
    }

    async fn get_payout(&self, id: Uuid) -> StoreResult<PayoutRequest> {
        let inner = self.inner.lock().await;
        inner
            .payouts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Payout request {}", id)))
    }

    async fn list_payouts(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<PayoutRequest>> {
        let inner = self.inner.lock().await;
        let mut requests: Vec<PayoutRequest> = inner
            .payouts
            .values()
            .filter(|r| user_id.map_or(true, |id| r.user_id == id))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        newest_first(&mut requests, |r| r.created_at);
        Ok(requests)
    }

    async fn resolve_payout(
        &self,
        id: Uuid,
        review: Review,
        reviewer: Uuid,
        note: Option<String>,
    ) -> StoreResult<PayoutRequest> {
        let mut inner = self.inner.lock().await;
        let request = inner
            .payouts
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Payout request {}", id)))?;
        if request.status != RequestStatus::Pending {
            return Err(StoreError::Conflict(format!(
                "Payout request {} is already {:?}",
                id, request.status
            )));
        }

        let status = match review {
            Review::Approve => {
                inner.post(
                    request.user_id,
                    -request.amount,
                    TransactionKind::Payout,
                    Some(request.id),
                )?;
                RequestStatus::Completed
            }
            Review::Reject => RequestStatus::Rejected,
        };

        let resolved = PayoutRequest {
            status,
            reviewed_by: Some(reviewer),
            note: note.or(request.note.clone()),
            updated_at: Utc::now(),
            ..request
        };
        inner.payouts.insert(id, resolved.clone());
        Ok(resolved)
    }

    async fn transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> StoreResult<Transfer> {
        let mut inner = self.inner.lock().await;
        // Both parties must exist before either balance moves
        inner.user_mut(to)?;
        let debit = inner.post(from, -amount, TransactionKind::ManualTopUpDebit, Some(to))?;
        let credit = inner.post(to, amount, TransactionKind::ManualTopUpCredit, Some(from))?;
        Ok(Transfer { debit, credit })
    }

    async fn list_transactions(&self, user_id: Uuid) -> StoreResult<Vec<WalletTransaction>> {
        let inner = self.inner.lock().await;
        let mut txs: Vec<WalletTransaction> = inner
            .transactions
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        // Ledger order, newest first
        txs.reverse();
        Ok(txs)
    }
}

#[async_trait]
impl AdRepo for MemoryStore {
    async fn insert_ad(&self, ad: &Advertisement) -> StoreResult<Advertisement> {
        let mut inner = self.inner.lock().await;
        if ad.is_active {
            deactivate_audience(&mut inner, ad.audience, ad.id);
        }
        inner.ads.insert(ad.id, ad.clone());
        Ok(ad.clone())
    }

    async fn get_ad(&self, id: Uuid) -> StoreResult<Advertisement> {
        let inner = self.inner.lock().await;
        inner
            .ads
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Advertisement {}", id)))
    }

    async fn update_ad(&self, ad: &Advertisement) -> StoreResult<Advertisement> {
        let mut inner = self.inner.lock().await;
        let current = inner
            .ads
            .get(&ad.id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("Advertisement {}", ad.id)))?;
        // Moving an active ad to another audience must not leave two active there
        if current.is_active && current.audience != ad.audience {
            deactivate_audience(&mut inner, ad.audience, ad.id);
        }
        let updated = Advertisement {
            is_active: current.is_active,
            created_at: current.created_at,
            updated_at: Utc::now(),
            ..ad.clone()
        };
        inner.ads.insert(ad.id, updated.clone());
        Ok(updated)
    }

    async fn delete_ad(&self, id: Uuid) -> StoreResult<()> {
        let mut inner = self.inner.lock().await;
        inner
            .ads
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("Advertisement {}", id)))
    }

    async fn list_ads(&self, query: &ListAdsQuery) -> StoreResult<Vec<Advertisement>> {
        let inner = self.inner.lock().await;
        let mut ads: Vec<Advertisement> = inner
            .ads
            .values()
            .filter(|a| query.audience.map_or(true, |aud| a.audience == aud))
            .filter(|a| query.active.map_or(true, |act| a.is_active == act))
            .cloned()
            .collect();
        newest_first(&mut ads, |a| a.created_at);
        Ok(ads)
    }

    async fn set_ad_active(&self, id: Uuid, active: bool) -> StoreResult<Advertisement> {
        let mut inner = self.inner.lock().await;
        let audience = inner
            .ads
            .get(&id)
            .map(|a| a.audience)
            .ok_or_else(|| StoreError::NotFound(format!("Advertisement {}", id)))?;
        if active {
            deactivate_audience(&mut inner, audience, id);
        }
        let ad = inner
            .ads
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Advertisement {}", id)))?;
        ad.is_active = active;
        ad.updated_at = Utc::now();
        Ok(ad.clone())
    }

    async fn active_ads_for(&self, audience: AdAudience) -> StoreResult<Vec<Advertisement>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .ads
            .values()
            .filter(|a| a.is_active && a.audience == audience)
            .cloned()
            .collect())
    }
}

fn deactivate_audience(inner: &mut Inner, audience: AdAudience, except: Uuid) {
    let now = Utc::now();
    for ad in inner.ads.values_mut() {
        if ad.audience == audience && ad.id != except && ad.is_active {
            ad.is_active = false;
            ad.updated_at = now;
        }
    }
}

#[async_trait]
impl ConfigRepo for MemoryStore {
    async fn load_config(&self) -> StoreResult<Option<AppConfig>> {
        Ok(self.inner.lock().await.config.clone())
    }

    async fn save_config(
        &self,
        config: &AppConfig,
        expected_version: i64,
    ) -> StoreResult<AppConfig> {
        let mut inner = self.inner.lock().await;
        let current = inner.config.as_ref().map_or(0, |c| c.version);
        if current != expected_version {
            return Err(StoreError::Conflict(format!(
                "Config is at version {}, expected {}",
                current, expected_version
            )));
        }
        inner.config = Some(config.clone());
        Ok(config.clone())
    }
}

#[async_trait]
impl NotificationRepo for MemoryStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> StoreResult<Notification> {
        let mut inner = self.inner.lock().await;
        inner.notifications.push(notification.clone());
        Ok(notification.clone())
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> StoreResult<Vec<Notification>> {
        let inner = self.inner.lock().await;
        let mut list: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| match n.user_id {
                Some(id) => id == user_id,
                None => n.role.map_or(true, |r| r == role),
            })
            .cloned()
            .collect();
        newest_first(&mut list, |n| n.created_at);
        Ok(list)
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<Notification> {
        let mut inner = self.inner.lock().await;
        let notification = inner
            .notifications
            .iter_mut()
            .find(|n| n.id == id && n.user_id == Some(user_id))
            .ok_or_else(|| StoreError::NotFound(format!("Notification {}", id)))?;
        notification.read = true;
        Ok(notification.clone())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::AppSettings;
    use crate::ride::{plan_transition, Actor, RideCommand, RideStatus, VehicleClass};
    use rust_decimal_macros::dec;

    async fn store_with_users(balances: &[Decimal]) -> (MemoryStore, Vec<Uuid>) {
        let store = MemoryStore::new();
        let mut ids = Vec::new();
        for balance in balances {
            let mut user = User::new(Uuid::new_v4(), "u@example.com".into(), UserRole::Customer);
            user.wallet_balance = *balance;
            store.ensure_user(&user).await.unwrap();
            ids.push(user.id);
        }
        (store, ids)
    }

    #[tokio::test]
    async fn test_transfer_moves_exact_amount() {
        let (store, ids) = store_with_users(&[dec!(100), dec!(5)]).await;
        let transfer = store.transfer(ids[0], ids[1], dec!(40)).await.unwrap();

        assert_eq!(transfer.debit.amount, dec!(-40));
        assert_eq!(transfer.debit.balance_after, dec!(60));
        assert_eq!(transfer.credit.balance_after, dec!(45));
        assert_eq!(store.get_user(ids[0]).await.unwrap().wallet_balance, dec!(60));
        assert_eq!(store.get_user(ids[1]).await.unwrap().wallet_balance, dec!(45));
    }

    #[tokio::test]
    async fn test_short_transfer_changes_nothing() {
        let (store, ids) = store_with_users(&[dec!(10), dec!(0)]).await;
        let err = store.transfer(ids[0], ids[1], dec!(20)).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::InsufficientFunds {
                available: dec!(10),
                requested: dec!(20)
            }
        );
        assert_eq!(store.get_user(ids[0]).await.unwrap().wallet_balance, dec!(10));
        assert_eq!(store.get_user(ids[1]).await.unwrap().wallet_balance, dec!(0));
        assert!(store.list_transactions(ids[0]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_transfer_to_unknown_user_changes_nothing() {
        let (store, ids) = store_with_users(&[dec!(50)]).await;
        let err = store.transfer(ids[0], Uuid::new_v4(), dec!(20)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(store.get_user(ids[0]).await.unwrap().wallet_balance, dec!(50));
    }

    async fn insert_booked(store: &MemoryStore, customer: Uuid) -> Ride {
        let now = Utc::now();
        let ride = Ride {
            id: Uuid::new_v4(),
            customer_id: customer,
            driver_id: None,
            pickup_address: "Old Town".into(),
            pickup_lat: None,
            pickup_lng: None,
            dropoff_address: "Harbour".into(),
            dropoff_lat: None,
            dropoff_lng: None,
            vehicle_class: Some(VehicleClass::Mini),
            fare: Some(dec!(80)),
            tip: Decimal::ZERO,
            commission: None,
            driver_earnings: None,
            status: RideStatus::Booked,
            version: 2,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        let entry = RideHistoryEntry {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            from_status: Some(RideStatus::Pending),
            to_status: RideStatus::Booked,
            actor_id: customer,
            actor_role: UserRole::Customer,
            version: 2,
            note: None,
            created_at: now,
        };
        store.insert_ride(&ride, &entry).await.unwrap()
    }

    fn accept_write(ride: &Ride, driver: &Actor) -> TransitionWrite {
        let t = plan_transition(
            ride,
            &RideCommand::Accept,
            driver,
            &AppSettings::default(),
            Utc::now(),
        )
        .unwrap();
        TransitionWrite {
            ride: t.next,
            expected_version: t.expected_version,
            expected_status: t.expected_status,
            entry: t.entry,
            settlement: t.settlement,
        }
    }

    #[tokio::test]
    async fn test_driver_cannot_be_written_onto_two_active_rides() {
        let store = MemoryStore::new();
        let customer = Uuid::new_v4();
        let driver = Actor::new(Uuid::new_v4(), UserRole::Driver);
        let first = insert_booked(&store, customer).await;
        let second = insert_booked(&store, customer).await;

        // Both planned before either lands, as two racing requests would be
        let take_first = accept_write(&first, &driver);
        let take_second = accept_write(&second, &driver);

        store.apply_transition(take_first).await.unwrap();
        let err = store.apply_transition(take_second).await.unwrap_err();
        assert!(matches!(err, StoreError::DriverBusy(_)));

        let untouched = store.get_ride(second.id).await.unwrap();
        assert_eq!(untouched.status, RideStatus::Booked);
        assert_eq!(untouched.driver_id, None);
        assert_eq!(store.ride_history(second.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_payout_review_keeps_note_unless_replaced() {
        let (store, ids) = store_with_users(&[dec!(100)]).await;
        let admin = Uuid::new_v4();

        let mut kept = PayoutRequest::new(ids[0], dec!(30), "acct-7".into());
        kept.note = Some("weekly cash-out".into());
        let kept = store.insert_payout(&kept).await.unwrap();
        let resolved = store
            .resolve_payout(kept.id, Review::Approve, admin, None)
            .await
            .unwrap();
        assert_eq!(resolved.note.as_deref(), Some("weekly cash-out"));

        let mut replaced = PayoutRequest::new(ids[0], dec!(30), "acct-7".into());
        replaced.note = Some("weekly cash-out".into());
        let replaced = store.insert_payout(&replaced).await.unwrap();
        let resolved = store
            .resolve_payout(replaced.id, Review::Reject, admin, Some("bank details wrong".into()))
            .await
            .unwrap();
        assert_eq!(resolved.note.as_deref(), Some("bank details wrong"));
    }

    #[tokio::test]
    async fn test_config_save_requires_expected_version() {
        let store = MemoryStore::new();
        let config = AppConfig::initial();
        store.save_config(&config, 0).await.unwrap();

        let err = store.save_config(&config, 0).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let next = AppConfig {
            version: 2,
            ..config.clone()
        };
        store.save_config(&next, 1).await.unwrap();
        assert_eq!(store.load_config().await.unwrap().unwrap().version, 2);
    }
}
