//! Ride service
//!
//! Loads a ride, plans the transition against the current configuration and
//! writes it back conditionally on the version it read. A writer that lost a
//! race gets [`RideError::Conflict`] and nothing is changed.

use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::lifecycle::{plan_transition, Actor, RideCommand, TransitionError};
use super::{
    CreateRideRequest, ListRidesQuery, Ride, RideEvent, RideHistoryEntry, RideMessage, RideStatus,
    VehicleClass,
};
use crate::app_config::AppConfigService;
use crate::error::ApiError;
use crate::models::{ApprovalStatus, UserRole};
use crate::notifications::NotificationService;
use crate::store::{RideRepo, Store, StoreError, TransitionWrite, UserRepo};
use crate::websocket::WsState;

/// How many bookable rides the dispatch feed shows
pub const BOOKABLE_FEED_LIMIT: i64 = 10;

#[derive(Error, Debug)]
pub enum RideError {
    #[error("{0}")]
    Forbidden(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error("Ride was modified concurrently: {0}")]
    Conflict(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Driver cannot take rides: {0}")]
    DriverUnavailable(String),

    #[error("Chat is disabled")]
    ChatDisabled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RideError> for ApiError {
    fn from(err: RideError) -> Self {
        match err {
            RideError::Forbidden(msg) => ApiError::Forbidden(msg),
            RideError::Transition(ref t) => match t {
                TransitionError::RoleNotPermitted { .. } | TransitionError::NotParty(_) => {
                    ApiError::Forbidden(err.to_string())
                }
                TransitionError::Terminal(_) | TransitionError::NotAllowed { .. } => {
                    ApiError::Conflict(err.to_string())
                }
                _ => ApiError::UnprocessableEntity(err.to_string()),
            },
            RideError::Conflict(_) => ApiError::Conflict(err.to_string()),
            RideError::Validation(msg) => ApiError::ValidationError(msg),
            RideError::DriverUnavailable(_) => ApiError::UnprocessableEntity(err.to_string()),
            RideError::ChatDisabled => ApiError::Forbidden(err.to_string()),
            RideError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for RideError {
    fn from(errors: validator::ValidationErrors) -> Self {
        RideError::Validation(errors.to_string())
    }
}

#[derive(Clone)]
pub struct RideService {
    store: Arc<dyn Store>,
    app_config: Arc<AppConfigService>,
    ws_state: WsState,
    notifications: Arc<NotificationService>,
}

impl RideService {
    pub fn new(
        store: Arc<dyn Store>,
        app_config: Arc<AppConfigService>,
        ws_state: WsState,
        notifications: Arc<NotificationService>,
    ) -> Self {
        Self {
            store,
            app_config,
            ws_state,
            notifications,
        }
    }

    /// Open a ride in `pending`; the customer picks a vehicle class next
    pub async fn request_ride(
        &self,
        actor: Actor,
        request: CreateRideRequest,
    ) -> Result<Ride, RideError> {
        if actor.role != UserRole::Customer {
            return Err(RideError::Forbidden(
                "Only customers can request rides".to_string(),
            ));
        }
        request.validate()?;
        for point in [request.pickup, request.dropoff].into_iter().flatten() {
            if !point.is_valid() {
                return Err(RideError::Validation(format!(
                    "coordinates out of range: ({}, {})",
                    point.lat, point.lng
                )));
            }
        }

        let now = Utc::now();
        let ride = Ride {
            id: Uuid::new_v4(),
            customer_id: actor.user_id,
            driver_id: None,
            pickup_address: request.pickup_address,
            pickup_lat: request.pickup.map(|p| p.lat),
            pickup_lng: request.pickup.map(|p| p.lng),
            dropoff_address: request.dropoff_address,
            dropoff_lat: request.dropoff.map(|p| p.lat),
            dropoff_lng: request.dropoff.map(|p| p.lng),
            vehicle_class: None,
            fare: None,
            tip: Decimal::ZERO,
            commission: None,
            driver_earnings: None,
            status: RideStatus::Pending,
            version: 1,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        let entry = RideHistoryEntry {
            id: Uuid::new_v4(),
            ride_id: ride.id,
            from_status: None,
            to_status: RideStatus::Pending,
            actor_id: actor.user_id,
            actor_role: actor.role,
            version: 1,
            note: None,
            created_at: now,
        };

        let ride = self.store.insert_ride(&ride, &entry).await?;

        tracing::info!(ride_id = %ride.id, customer_id = %actor.user_id, "Ride requested");

        Ok(ride)
    }

    fn can_view(ride: &Ride, actor: &Actor) -> bool {
        match actor.role {
            UserRole::Admin => true,
            UserRole::Customer => ride.customer_id == actor.user_id,
            // Drivers also see anything currently up for grabs
            UserRole::Driver => {
                ride.driver_id == Some(actor.user_id) || ride.status == RideStatus::Booked
            }
        }
    }

    pub async fn get_ride(&self, actor: &Actor, ride_id: Uuid) -> Result<Ride, RideError> {
        let ride = self.store.get_ride(ride_id).await?;
        if !Self::can_view(&ride, actor) {
            return Err(RideError::Forbidden(format!(
                "Ride {} is not visible to this user",
                ride_id
            )));
        }
        Ok(ride)
    }

    /// The actor's own rides, newest first
    pub async fn list_for_user(
        &self,
        actor: &Actor,
        status: Option<RideStatus>,
    ) -> Result<Vec<Ride>, RideError> {
        let mut query = ListRidesQuery {
            status,
            ..Default::default()
        };
        match actor.role {
            UserRole::Customer => query.customer_id = Some(actor.user_id),
            UserRole::Driver => query.driver_id = Some(actor.user_id),
            UserRole::Admin => {}
        }
        Ok(self.store.list_rides(&query).await?)
    }

    /// Admin listing with arbitrary filters
    pub async fn list_rides(&self, query: ListRidesQuery) -> Result<Vec<Ride>, RideError> {
        Ok(self.store.list_rides(&query).await?)
    }

    /// Rides waiting for a driver, newest first
    pub async fn bookable_rides(&self) -> Result<Vec<Ride>, RideError> {
        let query = ListRidesQuery {
            status: Some(RideStatus::Booked),
            limit: Some(BOOKABLE_FEED_LIMIT),
            ..Default::default()
        };
        Ok(self.store.list_rides(&query).await?)
    }

    pub async fn select_vehicle(
        &self,
        actor: Actor,
        ride_id: Uuid,
        vehicle_class: VehicleClass,
    ) -> Result<Ride, RideError> {
        self.execute(actor, ride_id, RideCommand::SelectVehicle { vehicle_class })
            .await
    }

    /// Claim a booked ride. Exactly one of several concurrent callers wins.
    pub async fn accept(&self, actor: Actor, ride_id: Uuid) -> Result<Ride, RideError> {
        if actor.role == UserRole::Driver {
            self.check_driver_available(actor.user_id).await?;
        }
        self.execute(actor, ride_id, RideCommand::Accept).await
    }

    async fn check_driver_available(&self, driver_id: Uuid) -> Result<(), RideError> {
        let driver = self.store.get_user(driver_id).await?;
        if driver.approval_status != ApprovalStatus::Approved {
            return Err(RideError::DriverUnavailable(format!(
                "account is {:?}",
                driver.approval_status
            )));
        }
        if !driver.is_online {
            return Err(RideError::DriverUnavailable("driver is offline".to_string()));
        }

        let assigned = self
            .store
            .list_rides(&ListRidesQuery {
                driver_id: Some(driver_id),
                ..Default::default()
            })
            .await?;
        if let Some(active) = assigned.iter().find(|r| !r.status.is_terminal()) {
            return Err(RideError::DriverUnavailable(format!(
                "already assigned to ride {}",
                active.id
            )));
        }
        Ok(())
    }

    pub async fn start_enroute(&self, actor: Actor, ride_id: Uuid) -> Result<Ride, RideError> {
        self.execute(actor, ride_id, RideCommand::StartEnroute).await
    }

    pub async fn arrive(&self, actor: Actor, ride_id: Uuid) -> Result<Ride, RideError> {
        self.execute(actor, ride_id, RideCommand::ArriveAtPickup)
            .await
    }

    pub async fn start_trip(&self, actor: Actor, ride_id: Uuid) -> Result<Ride, RideError> {
        self.execute(actor, ride_id, RideCommand::StartTrip).await
    }

    /// Finish the trip and credit the driver in the same write
    pub async fn complete(
        &self,
        actor: Actor,
        ride_id: Uuid,
        tip: Option<Decimal>,
    ) -> Result<Ride, RideError> {
        let tip = tip.unwrap_or(Decimal::ZERO);
        if tip < Decimal::ZERO || tip.round_dp(2) != tip {
            return Err(RideError::Validation(format!("invalid tip {}", tip)));
        }
        self.execute(actor, ride_id, RideCommand::Complete { tip })
            .await
    }

    pub async fn cancel(
        &self,
        actor: Actor,
        ride_id: Uuid,
        reason: Option<String>,
    ) -> Result<Ride, RideError> {
        let command = match actor.role {
            UserRole::Customer => RideCommand::CancelByCustomer { reason },
            UserRole::Driver => RideCommand::CancelByDriver { reason },
            UserRole::Admin => {
                return Err(RideError::Forbidden(
                    "Admins change ride status through force_status".to_string(),
                ))
            }
        };
        self.execute(actor, ride_id, command).await
    }

    pub async fn force_status(
        &self,
        actor: Actor,
        ride_id: Uuid,
        status: RideStatus,
        note: Option<String>,
    ) -> Result<Ride, RideError> {
        let ride = self
            .execute(actor, ride_id, RideCommand::ForceStatus { status, note })
            .await?;
        tracing::warn!(ride_id = %ride_id, admin_id = %actor.user_id, status = %status, "Ride status forced");
        Ok(ride)
    }

    pub async fn history(
        &self,
        actor: &Actor,
        ride_id: Uuid,
    ) -> Result<Vec<RideHistoryEntry>, RideError> {
        self.get_ride(actor, ride_id).await?;
        Ok(self.store.ride_history(ride_id).await?)
    }

    pub async fn post_message(
        &self,
        actor: Actor,
        ride_id: Uuid,
        body: String,
    ) -> Result<RideMessage, RideError> {
        if !self.app_config.current().await.settings.toggles.chat_enabled {
            return Err(RideError::ChatDisabled);
        }

        let ride = self.store.get_ride(ride_id).await?;
        if !ride.is_party(actor.user_id) {
            return Err(RideError::Forbidden(
                "Only the ride's customer and driver can chat".to_string(),
            ));
        }
        if ride.driver_id.is_none() || ride.status.is_terminal() {
            return Err(RideError::Validation(format!(
                "Chat is closed for a ride that is {}",
                ride.status
            )));
        }

        let body = body.trim().to_string();
        if body.is_empty() || body.chars().count() > 1000 {
            return Err(RideError::Validation(
                "message must be 1 to 1000 characters".to_string(),
            ));
        }

        let message = self
            .store
            .insert_message(&RideMessage {
                id: Uuid::new_v4(),
                ride_id,
                sender_id: actor.user_id,
                body,
                created_at: Utc::now(),
            })
            .await?;

        self.ws_state
            .broadcast_event(RideEvent::MessagePosted {
                ride_id,
                message_id: message.id,
                sender_id: actor.user_id,
            })
            .await;

        Ok(message)
    }

    pub async fn list_messages(
        &self,
        actor: &Actor,
        ride_id: Uuid,
    ) -> Result<Vec<RideMessage>, RideError> {
        let ride = self.store.get_ride(ride_id).await?;
        if actor.role != UserRole::Admin && !ride.is_party(actor.user_id) {
            return Err(RideError::Forbidden(
                "Only the ride's customer and driver can read its chat".to_string(),
            ));
        }
        Ok(self.store.list_messages(ride_id).await?)
    }

    async fn execute(
        &self,
        actor: Actor,
        ride_id: Uuid,
        command: RideCommand,
    ) -> Result<Ride, RideError> {
        let ride = self.store.get_ride(ride_id).await?;
        let settings = self.app_config.current().await.settings;
        let transition = plan_transition(&ride, &command, &actor, &settings, Utc::now())?;

        let updated = self
            .store
            .apply_transition(TransitionWrite {
                ride: transition.next,
                expected_version: transition.expected_version,
                expected_status: transition.expected_status,
                entry: transition.entry,
                settlement: transition.settlement,
            })
            .await
            .map_err(|e| match e {
                StoreError::Conflict(msg) => RideError::Conflict(msg),
                StoreError::DriverBusy(msg) => RideError::DriverUnavailable(msg),
                other => other.into(),
            })?;

        tracing::info!(
            ride_id = %updated.id,
            command = command.name(),
            from = %ride.status,
            to = %updated.status,
            version = updated.version,
            actor_id = %actor.user_id,
            "Ride transition applied"
        );

        if let Some(settlement) = &transition.settlement {
            tracing::info!(
                ride_id = %updated.id,
                fare = %settlement.fare,
                commission = %settlement.commission,
                driver_earnings = %settlement.driver_earnings,
                "Ride settled"
            );
        }

        self.ws_state
            .broadcast_event(RideEvent::for_ride(&updated))
            .await;
        self.notify_parties(&updated).await;

        Ok(updated)
    }

    /// Push the status changes the other party cares about
    async fn notify_parties(&self, ride: &Ride) {
        let (recipient, title, body) = match ride.status {
            RideStatus::Accepted => (
                Some(ride.customer_id),
                "Driver assigned",
                "A driver accepted your ride and is on the way",
            ),
            RideStatus::AtPickup => (
                Some(ride.customer_id),
                "Driver has arrived",
                "Your driver is waiting at the pickup point",
            ),
            RideStatus::Completed => (
                Some(ride.customer_id),
                "Trip completed",
                "Thanks for riding with us",
            ),
            RideStatus::CancelledByDriver => (
                Some(ride.customer_id),
                "Ride cancelled",
                "Your driver cancelled the ride",
            ),
            RideStatus::CancelledByCustomer => (
                ride.driver_id,
                "Ride cancelled",
                "The customer cancelled the ride",
            ),
            _ => (None, "", ""),
        };

        if let Some(user_id) = recipient {
            if let Err(e) = self.notifications.notify_user(user_id, title, body).await {
                tracing::warn!(ride_id = %ride.id, user_id = %user_id, "Failed to notify: {}", e);
            }
        }
    }
}
