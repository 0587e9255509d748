//! Profiles, driver approval, documents and driver presence

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use crate::app_config::AppConfigService;
use crate::error::ApiError;
use crate::models::{
    ApprovalStatus, DocumentKind, DocumentStatus, DriverDocument, GeoPoint, ListUsersQuery,
    UpdateProfileRequest, UploadDocumentRequest, User, UserResponse, UserRole,
};
use crate::store::{Store, StoreError, UserRepo};

#[derive(Error, Debug)]
pub enum UserError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("Driver cannot be approved before these documents are approved: {0:?}")]
    DocumentsIncomplete(Vec<DocumentKind>),

    #[error("Driver account is {0:?}; only approved drivers may go online")]
    NotApproved(ApprovalStatus),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<UserError> for ApiError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::Validation(msg) => ApiError::ValidationError(msg),
            UserError::Forbidden(msg) => ApiError::Forbidden(msg),
            UserError::DocumentsIncomplete(_) | UserError::NotApproved(_) => {
                ApiError::UnprocessableEntity(err.to_string())
            }
            UserError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for UserError {
    fn from(errors: validator::ValidationErrors) -> Self {
        UserError::Validation(errors.to_string())
    }
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    app_config: Arc<AppConfigService>,
    /// Positions older than this count as stale
    stale_after: Duration,
}

impl UserService {
    pub fn new(
        store: Arc<dyn Store>,
        app_config: Arc<AppConfigService>,
        stale_after: Duration,
    ) -> Self {
        Self {
            store,
            app_config,
            stale_after,
        }
    }

    fn respond(&self, user: User) -> UserResponse {
        UserResponse::for_user(user, Utc::now(), self.stale_after)
    }

    async fn driver(&self, id: Uuid) -> Result<User, UserError> {
        let user = self.store.get_user(id).await?;
        if user.role != UserRole::Driver {
            return Err(UserError::Forbidden(format!("User {} is not a driver", id)));
        }
        Ok(user)
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<UserResponse, UserError> {
        Ok(self.respond(self.store.get_user(id).await?))
    }

    pub async fn update_profile(
        &self,
        id: Uuid,
        request: UpdateProfileRequest,
    ) -> Result<UserResponse, UserError> {
        request.validate()?;
        if request.vehicle_class.is_some() {
            self.driver(id).await?;
        }
        let user = self.store.update_profile(id, &request).await?;
        Ok(self.respond(user))
    }

    pub async fn register_device_token(
        &self,
        id: Uuid,
        token: Option<String>,
    ) -> Result<UserResponse, UserError> {
        let registered = token.is_some();
        let user = self.store.set_device_token(id, token).await?;
        tracing::debug!(user_id = %id, registered, "Device token updated");
        Ok(self.respond(user))
    }

    pub async fn list_users(&self, query: ListUsersQuery) -> Result<Vec<UserResponse>, UserError> {
        let users = self.store.list_users(&query).await?;
        Ok(users.into_iter().map(|u| self.respond(u)).collect())
    }

    /// Admin review of an account. Drivers are only approved once every
    /// required document has been approved.
    pub async fn set_approval_status(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        status: ApprovalStatus,
    ) -> Result<UserResponse, UserError> {
        if admin_id == user_id {
            return Err(UserError::Forbidden(
                "Admins cannot change their own approval status".to_string(),
            ));
        }

        let user = self.store.get_user(user_id).await?;
        if user.role == UserRole::Driver && status == ApprovalStatus::Approved {
            let missing = self.missing_documents(user_id).await?;
            if !missing.is_empty() {
                return Err(UserError::DocumentsIncomplete(missing));
            }
        }

        let updated = self.store.set_approval_status(user_id, status).await?;

        tracing::info!(
            user_id = %user_id,
            admin_id = %admin_id,
            status = ?status,
            "Approval status changed"
        );

        Ok(self.respond(updated))
    }

    /// Required document kinds that are absent or not yet approved
    pub async fn missing_documents(&self, user_id: Uuid) -> Result<Vec<DocumentKind>, UserError> {
        let docs = self.store.list_documents(user_id).await?;
        Ok(DocumentKind::REQUIRED
            .into_iter()
            .filter(|kind| {
                !docs
                    .iter()
                    .any(|d| d.kind == *kind && d.status == DocumentStatus::Approved)
            })
            .collect())
    }

    /// Submit or replace a document. A replacement always goes back to
    /// pending, whatever the previous verdict was.
    pub async fn upload_document(
        &self,
        driver_id: Uuid,
        request: UploadDocumentRequest,
    ) -> Result<DriverDocument, UserError> {
        request.validate()?;
        self.driver(driver_id).await?;

        let doc = self
            .store
            .upsert_document(&DriverDocument::submitted(
                driver_id,
                request.kind,
                request.url,
            ))
            .await?;

        tracing::info!(user_id = %driver_id, kind = ?doc.kind, "Document submitted");

        Ok(doc)
    }

    pub async fn list_documents(&self, user_id: Uuid) -> Result<Vec<DriverDocument>, UserError> {
        Ok(self.store.list_documents(user_id).await?)
    }

    pub async fn review_document(
        &self,
        admin_id: Uuid,
        user_id: Uuid,
        kind: DocumentKind,
        status: DocumentStatus,
    ) -> Result<DriverDocument, UserError> {
        if status == DocumentStatus::Pending {
            return Err(UserError::Validation(
                "A review must approve or reject the document".to_string(),
            ));
        }

        let doc = self
            .store
            .set_document_status(user_id, kind, status, admin_id)
            .await?;

        tracing::info!(
            user_id = %user_id,
            admin_id = %admin_id,
            kind = ?kind,
            status = ?status,
            "Document reviewed"
        );

        Ok(doc)
    }

    pub async fn update_location(
        &self,
        driver_id: Uuid,
        point: GeoPoint,
    ) -> Result<UserResponse, UserError> {
        if !point.is_valid() {
            return Err(UserError::Validation(format!(
                "coordinates out of range: ({}, {})",
                point.lat, point.lng
            )));
        }
        self.driver(driver_id).await?;

        let user = self
            .store
            .update_location(driver_id, point, Utc::now())
            .await?;

        tracing::trace!(user_id = %driver_id, lat = point.lat, lng = point.lng, "Location updated");

        Ok(self.respond(user))
    }

    /// The driver's device refused location access; they cannot be dispatched
    pub async fn report_location_denied(&self, driver_id: Uuid) -> Result<UserResponse, UserError> {
        self.driver(driver_id).await?;
        let user = self.store.set_online(driver_id, false).await?;
        tracing::info!(user_id = %driver_id, "Location permission denied, driver taken offline");
        Ok(self.respond(user))
    }

    pub async fn set_online(&self, driver_id: Uuid, online: bool) -> Result<UserResponse, UserError> {
        let driver = self.driver(driver_id).await?;
        if online && driver.approval_status != ApprovalStatus::Approved {
            return Err(UserError::NotApproved(driver.approval_status));
        }

        let user = self.store.set_online(driver_id, online).await?;
        tracing::info!(user_id = %driver_id, online, "Driver availability changed");
        Ok(self.respond(user))
    }

    /// Take drivers with stale positions offline, when the toggle allows it
    pub async fn sweep_stale_locations(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>, UserError> {
        let config = self.app_config.current().await;
        if !config.settings.toggles.auto_offline_on_stale_location {
            return Ok(Vec::new());
        }
        Ok(self
            .store
            .mark_stale_drivers_offline(now - self.stale_after)
            .await?)
    }
}

/// Background task that periodically takes silent drivers offline
pub async fn location_sweeper(user_service: Arc<UserService>, interval: std::time::Duration) {
    tracing::info!("Starting stale location sweeper");

    loop {
        tokio::time::sleep(interval).await;

        match user_service.sweep_stale_locations(Utc::now()).await {
            Ok(offline) => {
                for user_id in offline {
                    tracing::info!(user_id = %user_id, "Driver location stale, marked offline");
                }
            }
            Err(e) => {
                tracing::error!("Error sweeping stale locations: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    async fn setup() -> (Arc<MemoryStore>, UserService) {
        let store = Arc::new(MemoryStore::new());
        let app_config = Arc::new(AppConfigService::load(store.clone()).await.unwrap());
        let service = UserService::new(store.clone(), app_config, Duration::seconds(120));
        (store, service)
    }

    async fn new_user(store: &MemoryStore, role: UserRole) -> Uuid {
        let user = User::new(Uuid::new_v4(), "u@example.com".into(), role);
        store.ensure_user(&user).await.unwrap().id
    }

    fn upload(kind: DocumentKind) -> UploadDocumentRequest {
        UploadDocumentRequest {
            kind,
            url: format!("https://cdn.example.com/{:?}.jpg", kind),
        }
    }

    #[tokio::test]
    async fn test_driver_approval_requires_documents() {
        let (store, service) = setup().await;
        let admin = new_user(&store, UserRole::Admin).await;
        let driver = new_user(&store, UserRole::Driver).await;

        let err = service
            .set_approval_status(admin, driver, ApprovalStatus::Approved)
            .await
            .unwrap_err();
        match err {
            UserError::DocumentsIncomplete(missing) => assert_eq!(missing.len(), 3),
            other => panic!("unexpected error: {:?}", other),
        }

        for kind in DocumentKind::REQUIRED {
            service.upload_document(driver, upload(kind)).await.unwrap();
            service
                .review_document(admin, driver, kind, DocumentStatus::Approved)
                .await
                .unwrap();
        }

        let approved = service
            .set_approval_status(admin, driver, ApprovalStatus::Approved)
            .await
            .unwrap();
        assert_eq!(approved.approval_status, ApprovalStatus::Approved);
    }

    #[tokio::test]
    async fn test_only_approved_drivers_go_online() {
        let (store, service) = setup().await;
        let driver = new_user(&store, UserRole::Driver).await;

        let err = service.set_online(driver, true).await.unwrap_err();
        assert!(matches!(err, UserError::NotApproved(ApprovalStatus::Pending)));

        store
            .set_approval_status(driver, ApprovalStatus::Approved)
            .await
            .unwrap();
        assert!(service.set_online(driver, true).await.unwrap().is_online);
    }

    #[tokio::test]
    async fn test_location_validation_and_denial() {
        let (store, service) = setup().await;
        let driver = new_user(&store, UserRole::Driver).await;
        store
            .set_approval_status(driver, ApprovalStatus::Approved)
            .await
            .unwrap();
        service.set_online(driver, true).await.unwrap();

        let err = service
            .update_location(driver, GeoPoint { lat: 95.0, lng: 10.0 })
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));

        let user = service
            .update_location(driver, GeoPoint { lat: 12.97, lng: 77.59 })
            .await
            .unwrap();
        assert!(!user.location_stale);
        assert_eq!(user.location, Some(GeoPoint { lat: 12.97, lng: 77.59 }));

        let user = service.report_location_denied(driver).await.unwrap();
        assert!(!user.is_online);
    }

    #[tokio::test]
    async fn test_sweep_takes_stale_drivers_offline() {
        let (store, service) = setup().await;
        let fresh = new_user(&store, UserRole::Driver).await;
        let stale = new_user(&store, UserRole::Driver).await;
        for id in [fresh, stale] {
            store.set_approval_status(id, ApprovalStatus::Approved).await.unwrap();
            store.set_online(id, true).await.unwrap();
        }
        let now = Utc::now();
        let point = GeoPoint { lat: 1.0, lng: 1.0 };
        store.update_location(fresh, point, now).await.unwrap();
        store
            .update_location(stale, point, now - Duration::seconds(600))
            .await
            .unwrap();

        let offline = service.sweep_stale_locations(now).await.unwrap();
        assert_eq!(offline, vec![stale]);
        assert!(store.get_user(fresh).await.unwrap().is_online);
        assert!(!store.get_user(stale).await.unwrap().is_online);
    }

    #[tokio::test]
    async fn test_customers_cannot_upload_documents() {
        let (store, service) = setup().await;
        let customer = new_user(&store, UserRole::Customer).await;
        let err = service
            .upload_document(customer, upload(DocumentKind::License))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Forbidden(_)));
    }
}
