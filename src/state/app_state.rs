//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;

use crate::ads::AdService;
use crate::app_config::AppConfigService;
use crate::auth::AuthService;
use crate::notifications::{NotificationService, PushGateway};
use crate::ride::RideService;
use crate::store::Store;
use crate::users::UserService;
use crate::wallet::WalletService;
use crate::websocket::WsState;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub auth_service: Arc<AuthService>,
    pub ride_service: Arc<RideService>,
    pub user_service: Arc<UserService>,
    pub wallet_service: Arc<WalletService>,
    pub ad_service: Arc<AdService>,
    pub app_config: Arc<AppConfigService>,
    pub notification_service: Arc<NotificationService>,
    pub ws_state: WsState,
}

/// Inputs needed to wire the services together
pub struct AppStateParts {
    pub store: Arc<dyn Store>,
    pub app_config: Arc<AppConfigService>,
    pub push_gateway: Arc<dyn PushGateway>,
    pub jwt_secret: String,
    pub location_stale_after: chrono::Duration,
}

impl AppState {
    pub fn new(parts: AppStateParts) -> Self {
        let AppStateParts {
            store,
            app_config,
            push_gateway,
            jwt_secret,
            location_stale_after,
        } = parts;

        let ws_state = WsState::new();
        let notification_service = Arc::new(NotificationService::new(store.clone(), push_gateway));
        let ride_service = Arc::new(RideService::new(
            store.clone(),
            app_config.clone(),
            ws_state.clone(),
            notification_service.clone(),
        ));

        Self {
            auth_service: Arc::new(AuthService::new(store.clone(), jwt_secret)),
            ride_service,
            user_service: Arc::new(UserService::new(
                store.clone(),
                app_config.clone(),
                location_stale_after,
            )),
            wallet_service: Arc::new(WalletService::new(store.clone())),
            ad_service: Arc::new(AdService::new(store.clone())),
            app_config,
            notification_service,
            ws_state,
            store,
        }
    }
}

impl FromRef<AppState> for WsState {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ws_state.clone()
    }
}

impl FromRef<AppState> for Arc<AuthService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.auth_service.clone()
    }
}

impl FromRef<AppState> for Arc<RideService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ride_service.clone()
    }
}

impl FromRef<AppState> for Arc<UserService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.user_service.clone()
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<AdService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.ad_service.clone()
    }
}

impl FromRef<AppState> for Arc<AppConfigService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.app_config.clone()
    }
}

impl FromRef<AppState> for Arc<NotificationService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.notification_service.clone()
    }
}

impl FromRef<AppState> for Arc<dyn Store> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.store.clone()
    }
}
