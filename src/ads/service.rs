use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;
use validator::Validate;

use super::{
    AdAudience, Advertisement, CreateAdRequest, ListAdsQuery, UpdateAdRequest,
};
use crate::error::ApiError;
use crate::models::UserRole;
use crate::store::{AdRepo, Store, StoreError};

#[derive(Error, Debug)]
pub enum AdError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AdError> for ApiError {
    fn from(err: AdError) -> Self {
        match err {
            AdError::Validation(msg) => ApiError::ValidationError(msg),
            AdError::Store(e) => e.into(),
        }
    }
}

impl From<validator::ValidationErrors> for AdError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AdError::Validation(errors.to_string())
    }
}

/// Advertisement management. At most one ad is active per audience.
#[derive(Clone)]
pub struct AdService {
    store: Arc<dyn Store>,
}

impl AdService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateAdRequest) -> Result<Advertisement, AdError> {
        request.validate()?;

        let now = Utc::now();
        let ad = Advertisement {
            id: Uuid::new_v4(),
            title: request.title,
            image_url: request.image_url,
            link_url: request.link_url,
            audience: request.audience,
            is_active: request.is_active,
            created_at: now,
            updated_at: now,
        };
        let ad = self.store.insert_ad(&ad).await?;

        tracing::info!(ad_id = %ad.id, audience = ?ad.audience, active = ad.is_active, "Advertisement created");

        Ok(ad)
    }

    pub async fn get(&self, id: Uuid) -> Result<Advertisement, AdError> {
        Ok(self.store.get_ad(id).await?)
    }

    pub async fn update(&self, id: Uuid, request: UpdateAdRequest) -> Result<Advertisement, AdError> {
        request.validate()?;

        let current = self.store.get_ad(id).await?;
        let next = Advertisement {
            title: request.title.unwrap_or(current.title),
            image_url: request.image_url.unwrap_or(current.image_url),
            link_url: request.link_url.or(current.link_url),
            audience: request.audience.unwrap_or(current.audience),
            ..current
        };

        Ok(self.store.update_ad(&next).await?)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), AdError> {
        self.store.delete_ad(id).await?;
        tracing::info!(ad_id = %id, "Advertisement deleted");
        Ok(())
    }

    pub async fn list(&self, query: ListAdsQuery) -> Result<Vec<Advertisement>, AdError> {
        Ok(self.store.list_ads(&query).await?)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<Advertisement, AdError> {
        let ad = self.store.set_ad_active(id, active).await?;
        tracing::info!(ad_id = %id, audience = ?ad.audience, active, "Advertisement activation changed");
        Ok(ad)
    }

    /// Active ads a user with `role` should see
    pub async fn active_for_role(&self, role: UserRole) -> Result<Vec<Advertisement>, AdError> {
        let mut ads = self.store.active_ads_for(AdAudience::All).await?;
        let own = match role {
            UserRole::Customer => Some(AdAudience::Customer),
            UserRole::Driver => Some(AdAudience::Driver),
            UserRole::Admin => None,
        };
        if let Some(audience) = own {
            ads.extend(self.store.active_ads_for(audience).await?);
        }
        Ok(ads)
    }
}
