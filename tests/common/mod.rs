//! Shared fixtures for the integration tests: an in-memory application with
//! helpers to create users in the states the tests need.

#![allow(dead_code)]

use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use rideway_server::app_config::AppConfigService;
use rideway_server::auth::issue_token;
use rideway_server::models::{
    ApprovalStatus, DocumentKind, DocumentStatus, UploadDocumentRequest, User, UserRole,
};
use rideway_server::notifications::LogPushGateway;
use rideway_server::ride::{Actor, CreateRideRequest, Ride, VehicleClass};
use rideway_server::state::{AppState, AppStateParts};
use rideway_server::store::{MemoryStore, Store, UserRepo};
use rideway_server::wallet::Review;

pub const JWT_SECRET: &str = "integration-test-secret";

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub state: AppState,
}

impl TestApp {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn Store> = store.clone();
        let app_config = Arc::new(
            AppConfigService::load(dyn_store.clone())
                .await
                .expect("config loads"),
        );
        let state = AppState::new(AppStateParts {
            store: dyn_store,
            app_config,
            push_gateway: Arc::new(LogPushGateway),
            jwt_secret: JWT_SECRET.to_string(),
            location_stale_after: chrono::Duration::seconds(120),
        });
        Self { store, state }
    }

    pub async fn user(&self, role: UserRole) -> Actor {
        let id = Uuid::new_v4();
        self.store
            .ensure_user(&User::new(id, format!("{}@example.com", id), role))
            .await
            .expect("user created");
        Actor::new(id, role)
    }

    pub async fn customer(&self) -> Actor {
        self.user(UserRole::Customer).await
    }

    pub async fn admin(&self) -> Actor {
        self.user(UserRole::Admin).await
    }

    /// A driver with approved documents, approved account and online
    pub async fn online_driver(&self, admin: &Actor) -> Actor {
        let driver = self.user(UserRole::Driver).await;
        let users = &self.state.user_service;

        for kind in DocumentKind::REQUIRED {
            users
                .upload_document(
                    driver.user_id,
                    UploadDocumentRequest {
                        kind,
                        url: format!("https://media.example.com/{}/{:?}.jpg", driver.user_id, kind),
                    },
                )
                .await
                .expect("document uploaded");
            users
                .review_document(admin.user_id, driver.user_id, kind, DocumentStatus::Approved)
                .await
                .expect("document approved");
        }
        users
            .set_approval_status(admin.user_id, driver.user_id, ApprovalStatus::Approved)
            .await
            .expect("driver approved");
        users
            .set_online(driver.user_id, true)
            .await
            .expect("driver online");

        driver
    }

    /// Credit `amount` to `user` through an approved top-up
    pub async fn fund(&self, admin: &Actor, user: &Actor, amount: Decimal) {
        let wallet = &self.state.wallet_service;
        let request = wallet
            .request_top_up(user.user_id, amount, None)
            .await
            .expect("top-up requested");
        wallet
            .review_top_up(admin.user_id, request.id, Review::Approve, None)
            .await
            .expect("top-up approved");
    }

    /// A ride in `booked` for `customer` with the given vehicle class
    pub async fn booked_ride(&self, customer: &Actor, class: VehicleClass) -> Ride {
        let rides = &self.state.ride_service;
        let ride = rides
            .request_ride(
                *customer,
                CreateRideRequest {
                    pickup_address: "12 Harbour Road".to_string(),
                    pickup: None,
                    dropoff_address: "City Mall".to_string(),
                    dropoff: None,
                },
            )
            .await
            .expect("ride requested");
        rides
            .select_vehicle(*customer, ride.id, class)
            .await
            .expect("vehicle selected")
    }

    pub fn token_for(&self, actor: &Actor) -> String {
        issue_token(
            actor.user_id,
            &format!("{}@example.com", actor.user_id),
            actor.role,
            JWT_SECRET,
            600,
        )
        .expect("token issued")
    }
}
