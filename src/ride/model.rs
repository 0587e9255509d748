//! Ride models and data structures

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::{GeoPoint, UserRole};

/// Vehicle classes a customer can choose between
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "vehicle_class", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    Bike,
    Auto,
    Mini,
    Sedan,
    Suv,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 5] = [
        VehicleClass::Bike,
        VehicleClass::Auto,
        VehicleClass::Mini,
        VehicleClass::Sedan,
        VehicleClass::Suv,
    ];
}

/// Ride lifecycle status
///
/// `pending` is the customer still choosing a vehicle class; drivers only ever
/// see rides once they are `booked`.
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ride_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RideStatus {
    Pending,
    Booked,
    Accepted,
    EnrouteToPickup,
    AtPickup,
    InProgress,
    Completed,
    CancelledByCustomer,
    CancelledByDriver,
}

impl RideStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RideStatus::Completed | RideStatus::CancelledByCustomer | RideStatus::CancelledByDriver
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            RideStatus::CancelledByCustomer | RideStatus::CancelledByDriver
        )
    }

    /// Position on the main path; cancelled states are off it
    pub fn rank(&self) -> Option<u8> {
        match self {
            RideStatus::Pending => Some(0),
            RideStatus::Booked => Some(1),
            RideStatus::Accepted => Some(2),
            RideStatus::EnrouteToPickup => Some(3),
            RideStatus::AtPickup => Some(4),
            RideStatus::InProgress => Some(5),
            RideStatus::Completed => Some(6),
            RideStatus::CancelledByCustomer | RideStatus::CancelledByDriver => None,
        }
    }

    /// Statuses at or past `booked` on the main path; these always carry a fare
    pub fn requires_fare(&self) -> bool {
        self.rank().is_some_and(|r| r >= 1)
    }

    /// Statuses in which a driver is assigned
    pub fn requires_driver(&self) -> bool {
        matches!(
            self,
            RideStatus::Accepted
                | RideStatus::EnrouteToPickup
                | RideStatus::AtPickup
                | RideStatus::InProgress
                | RideStatus::Completed
        )
    }

    /// Statuses in which the assigned driver is busy with this ride
    pub fn holds_driver(&self) -> bool {
        self.requires_driver() && !self.is_terminal()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RideStatus::Pending => "pending",
            RideStatus::Booked => "booked",
            RideStatus::Accepted => "accepted",
            RideStatus::EnrouteToPickup => "enroute_to_pickup",
            RideStatus::AtPickup => "at_pickup",
            RideStatus::InProgress => "in_progress",
            RideStatus::Completed => "completed",
            RideStatus::CancelledByCustomer => "cancelled_by_customer",
            RideStatus::CancelledByDriver => "cancelled_by_driver",
        }
    }
}

impl std::fmt::Display for RideStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ride model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Ride {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub driver_id: Option<Uuid>,
    pub pickup_address: String,
    pub pickup_lat: Option<f64>,
    pub pickup_lng: Option<f64>,
    pub dropoff_address: String,
    pub dropoff_lat: Option<f64>,
    pub dropoff_lng: Option<f64>,
    pub vehicle_class: Option<VehicleClass>,
    pub fare: Option<Decimal>,
    pub tip: Decimal,
    pub commission: Option<Decimal>,
    pub driver_earnings: Option<Decimal>,
    pub status: RideStatus,
    /// Bumped on every write; conditional updates key on it
    pub version: i64,
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn pickup(&self) -> Option<GeoPoint> {
        match (self.pickup_lat, self.pickup_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    pub fn dropoff(&self) -> Option<GeoPoint> {
        match (self.dropoff_lat, self.dropoff_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    /// Straight-line trip length when both ends have coordinates
    pub fn distance_km(&self) -> Option<f64> {
        Some(self.pickup()?.distance_km(&self.dropoff()?))
    }

    pub fn is_party(&self, user_id: Uuid) -> bool {
        self.customer_id == user_id || self.driver_id == Some(user_id)
    }
}

/// One row of the ride's transition history
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct RideHistoryEntry {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub from_status: Option<RideStatus>,
    pub to_status: RideStatus,
    pub actor_id: Uuid,
    pub actor_role: UserRole,
    pub version: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Chat message between the parties of a ride
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct RideMessage {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub sender_id: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Request/Response DTOs
// ============================================================================

/// Request to open a new ride
#[derive(Debug, Deserialize, Validate)]
pub struct CreateRideRequest {
    #[validate(length(min = 1, max = 300))]
    pub pickup_address: String,
    pub pickup: Option<GeoPoint>,
    #[validate(length(min = 1, max = 300))]
    pub dropoff_address: String,
    pub dropoff: Option<GeoPoint>,
}

#[derive(Debug, Deserialize)]
pub struct SelectVehicleRequest {
    pub vehicle_class: VehicleClass,
}

#[derive(Debug, Deserialize, Default)]
pub struct CompleteRideRequest {
    pub tip: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct CancelRideRequest {
    #[validate(length(max = 500))]
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForceStatusRequest {
    pub status: RideStatus,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PostMessageRequest {
    #[validate(length(min = 1, max = 1000))]
    pub body: String,
}

/// Query parameters for listing rides
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListRidesQuery {
    pub status: Option<RideStatus>,
    pub customer_id: Option<Uuid>,
    pub driver_id: Option<Uuid>,
    pub limit: Option<i64>,
}

/// Ride events pushed to WebSocket subscribers
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum RideEvent {
    Booked {
        ride_id: Uuid,
        customer_id: Uuid,
        vehicle_class: Option<VehicleClass>,
        fare: Option<Decimal>,
        pickup_address: String,
        dropoff_address: String,
        created_at: DateTime<Utc>,
    },
    StatusChanged {
        ride_id: Uuid,
        customer_id: Uuid,
        driver_id: Option<Uuid>,
        status: RideStatus,
        version: i64,
    },
    MessagePosted {
        ride_id: Uuid,
        message_id: Uuid,
        sender_id: Uuid,
    },
}

impl RideEvent {
    pub fn ride_id(&self) -> Uuid {
        match self {
            RideEvent::Booked { ride_id, .. }
            | RideEvent::StatusChanged { ride_id, .. }
            | RideEvent::MessagePosted { ride_id, .. } => *ride_id,
        }
    }

    /// The event announcing a ride's current state
    pub fn for_ride(ride: &Ride) -> Self {
        if ride.status == RideStatus::Booked {
            RideEvent::Booked {
                ride_id: ride.id,
                customer_id: ride.customer_id,
                vehicle_class: ride.vehicle_class,
                fare: ride.fare,
                pickup_address: ride.pickup_address.clone(),
                dropoff_address: ride.dropoff_address.clone(),
                created_at: ride.created_at,
            }
        } else {
            RideEvent::StatusChanged {
                ride_id: ride.id,
                customer_id: ride.customer_id,
                driver_id: ride.driver_id,
                status: ride.status,
                version: ride.version,
            }
        }
    }
}
