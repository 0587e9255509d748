//! Data models for Rideway users and driver onboarding

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub mod document;
pub use document::*;

use crate::ride::VehicleClass;

/// User model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub approval_status: ApprovalStatus,
    pub wallet_balance: Decimal,
    pub is_online: bool,
    pub last_lat: Option<f64>,
    pub last_lng: Option<f64>,
    pub location_updated_at: Option<DateTime<Utc>>,
    pub device_token: Option<String>,
    pub vehicle_class: Option<VehicleClass>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// A fresh account as first seen through an identity token
    pub fn new(id: Uuid, email: String, role: UserRole) -> Self {
        let now = Utc::now();
        // Customers and admins need no review; drivers wait for document approval
        let approval_status = match role {
            UserRole::Driver => ApprovalStatus::Pending,
            UserRole::Customer | UserRole::Admin => ApprovalStatus::Approved,
        };
        Self {
            id,
            email,
            display_name: None,
            phone: None,
            role,
            approval_status,
            wallet_balance: Decimal::ZERO,
            is_online: false,
            last_lat: None,
            last_lng: None,
            location_updated_at: None,
            device_token: None,
            vehicle_class: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn location(&self) -> Option<GeoPoint> {
        match (self.last_lat, self.last_lng) {
            (Some(lat), Some(lng)) => Some(GeoPoint { lat, lng }),
            _ => None,
        }
    }

    /// Whether the stored position is older than `stale_after`, or missing
    pub fn location_is_stale(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        match self.location_updated_at {
            Some(at) => now - at > stale_after,
            None => true,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.approval_status == ApprovalStatus::Blocked
    }
}

/// User roles
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Driver,
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Driver => "driver",
            UserRole::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(UserRole::Customer),
            "driver" => Some(UserRole::Driver),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Account review state
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
    Blocked,
}

/// A latitude/longitude pair in degrees
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// Great-circle distance in kilometres
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        const EARTH_RADIUS_KM: f64 = 6371.0;
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlng = (other.lng - self.lng).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// User response (sanitized for API)
#[derive(Debug, Serialize, Clone)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub phone: Option<String>,
    pub role: UserRole,
    pub approval_status: ApprovalStatus,
    pub wallet_balance: Decimal,
    pub is_online: bool,
    pub location: Option<GeoPoint>,
    pub location_updated_at: Option<DateTime<Utc>>,
    /// Drivers only: last position is older than the staleness window
    pub location_stale: bool,
    pub vehicle_class: Option<VehicleClass>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            location: user.location(),
            id: user.id,
            email: user.email,
            display_name: user.display_name,
            phone: user.phone,
            role: user.role,
            approval_status: user.approval_status,
            wallet_balance: user.wallet_balance,
            is_online: user.is_online,
            location_updated_at: user.location_updated_at,
            location_stale: false,
            vehicle_class: user.vehicle_class,
            created_at: user.created_at,
        }
    }
}

impl UserResponse {
    pub fn for_user(user: User, now: DateTime<Utc>, stale_after: Duration) -> Self {
        let stale = user.role == UserRole::Driver && user.location_is_stale(now, stale_after);
        Self {
            location_stale: stale,
            ..user.into()
        }
    }
}

/// Fields a user may change on their own profile
#[derive(Debug, Deserialize, Validate, Default, Clone)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    #[validate(length(min = 5, max = 20))]
    pub phone: Option<String>,
    pub vehicle_class: Option<VehicleClass>,
}

/// Query for admin user listings
#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListUsersQuery {
    pub role: Option<UserRole>,
    pub approval_status: Option<ApprovalStatus>,
    pub online: Option<bool>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SetOnlineRequest {
    pub online: bool,
}

/// `None` unregisters the device
#[derive(Debug, Deserialize, Validate)]
pub struct DeviceTokenRequest {
    #[validate(length(min = 1, max = 4096))]
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SetApprovalRequest {
    pub status: ApprovalStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_driver_starts_pending() {
        let driver = User::new(Uuid::new_v4(), "d@example.com".into(), UserRole::Driver);
        assert_eq!(driver.approval_status, ApprovalStatus::Pending);
        assert_eq!(driver.wallet_balance, Decimal::ZERO);
        assert!(!driver.is_online);

        let customer = User::new(Uuid::new_v4(), "c@example.com".into(), UserRole::Customer);
        assert_eq!(customer.approval_status, ApprovalStatus::Approved);
    }

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint { lat: 12.97, lng: 77.59 }.is_valid());
        assert!(!GeoPoint { lat: 91.0, lng: 0.0 }.is_valid());
        assert!(!GeoPoint { lat: 0.0, lng: -181.0 }.is_valid());
        assert!(!GeoPoint { lat: f64::NAN, lng: 0.0 }.is_valid());
    }

    #[test]
    fn test_distance_km() {
        let a = GeoPoint { lat: 0.0, lng: 0.0 };
        let b = GeoPoint { lat: 0.0, lng: 1.0 };
        let d = a.distance_km(&b);
        assert!((d - 111.19).abs() < 0.1, "got {}", d);
        assert_eq!(a.distance_km(&a), 0.0);
    }

    #[test]
    fn test_location_staleness() {
        let mut driver = User::new(Uuid::new_v4(), "d@example.com".into(), UserRole::Driver);
        let now = Utc::now();
        assert!(driver.location_is_stale(now, Duration::seconds(60)));

        driver.location_updated_at = Some(now - Duration::seconds(30));
        assert!(!driver.location_is_stale(now, Duration::seconds(60)));

        driver.location_updated_at = Some(now - Duration::seconds(90));
        assert!(driver.location_is_stale(now, Duration::seconds(60)));
    }

    #[test]
    fn test_role_round_trip_through_str() {
        for role in [UserRole::Customer, UserRole::Driver, UserRole::Admin] {
            assert_eq!(UserRole::parse(role.as_str()), Some(role));
        }
        assert_eq!(UserRole::parse("superuser"), None);
    }
}
