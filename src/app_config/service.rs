//! Runtime business configuration
//!
//! The stored record is the source of truth. Each process keeps the last
//! revision it saw in memory; `refresh` re-reads it and `update` writes a new
//! revision only if nobody else has since the caller read it.

use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{AppConfig, UpdateAppConfigRequest};
use crate::error::ApiError;
use crate::store::{ConfigRepo, Store, StoreError};

#[derive(Error, Debug)]
pub enum AppConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration changed since version {expected}; now at {current}")]
    StaleVersion { expected: i64, current: i64 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<AppConfigError> for ApiError {
    fn from(err: AppConfigError) -> Self {
        match err {
            AppConfigError::Invalid(msg) => ApiError::ValidationError(msg),
            AppConfigError::StaleVersion { .. } => ApiError::Conflict(err.to_string()),
            AppConfigError::Store(e) => e.into(),
        }
    }
}

pub struct AppConfigService {
    store: Arc<dyn Store>,
    cache: RwLock<AppConfig>,
}

impl AppConfigService {
    /// Read the stored configuration, writing the initial revision if there is none
    pub async fn load(store: Arc<dyn Store>) -> Result<Self, AppConfigError> {
        let config = match store.load_config().await? {
            Some(config) => config,
            None => {
                let initial = AppConfig::initial();
                match store.save_config(&initial, 0).await {
                    Ok(saved) => {
                        tracing::info!("Seeded initial app configuration");
                        saved
                    }
                    // Another instance seeded it first
                    Err(StoreError::Conflict(_)) => store
                        .load_config()
                        .await?
                        .ok_or_else(|| StoreError::NotFound("App configuration".to_string()))?,
                    Err(e) => return Err(e.into()),
                }
            }
        };

        tracing::info!(version = config.version, "App configuration loaded");

        Ok(Self {
            store,
            cache: RwLock::new(config),
        })
    }

    /// The last revision this process has seen
    pub async fn current(&self) -> AppConfig {
        self.cache.read().await.clone()
    }

    pub async fn refresh(&self) -> Result<AppConfig, AppConfigError> {
        let latest = self
            .store
            .load_config()
            .await?
            .ok_or_else(|| StoreError::NotFound("App configuration".to_string()))?;

        let mut cache = self.cache.write().await;
        if latest.version != cache.version {
            tracing::info!(
                from = cache.version,
                to = latest.version,
                "App configuration refreshed"
            );
        }
        *cache = latest.clone();
        Ok(latest)
    }

    pub async fn update(
        &self,
        admin_id: Uuid,
        request: UpdateAppConfigRequest,
    ) -> Result<AppConfig, AppConfigError> {
        let current = self.refresh().await?;
        if current.version != request.expected_version {
            return Err(AppConfigError::StaleVersion {
                expected: request.expected_version,
                current: current.version,
            });
        }

        let settings = request.apply_to(&current.settings);
        settings.validate().map_err(AppConfigError::Invalid)?;

        let next = AppConfig {
            version: current.version + 1,
            settings,
            updated_by: Some(admin_id),
            updated_at: Utc::now(),
        };

        let saved = match self.store.save_config(&next, request.expected_version).await {
            Ok(saved) => saved,
            Err(StoreError::Conflict(_)) => {
                let latest = self.refresh().await?;
                return Err(AppConfigError::StaleVersion {
                    expected: request.expected_version,
                    current: latest.version,
                });
            }
            Err(e) => return Err(e.into()),
        };

        *self.cache.write().await = saved.clone();

        tracing::info!(
            version = saved.version,
            admin_id = %admin_id,
            "App configuration updated"
        );

        Ok(saved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use rust_decimal_macros::dec;

    fn commission_update(expected_version: i64, rate: rust_decimal::Decimal) -> UpdateAppConfigRequest {
        UpdateAppConfigRequest {
            expected_version,
            fares: None,
            commission_rate: Some(rate),
            toggles: None,
        }
    }

    #[tokio::test]
    async fn test_load_seeds_initial_config() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = AppConfigService::load(store.clone()).await.unwrap();
        assert_eq!(service.current().await.version, 1);
        assert_eq!(store.load_config().await.unwrap().unwrap().version, 1);

        // A second process sees the same revision
        let other = AppConfigService::load(store).await.unwrap();
        assert_eq!(other.current().await.version, 1);
    }

    #[tokio::test]
    async fn test_update_bumps_version() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = AppConfigService::load(store).await.unwrap();
        let admin = Uuid::new_v4();

        let updated = service.update(admin, commission_update(1, dec!(0.2))).await.unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(updated.settings.commission_rate, dec!(0.2));
        assert_eq!(updated.updated_by, Some(admin));
        assert_eq!(service.current().await.version, 2);
    }

    #[tokio::test]
    async fn test_stale_version_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let first = AppConfigService::load(store.clone()).await.unwrap();
        let second = AppConfigService::load(store).await.unwrap();

        first.update(Uuid::new_v4(), commission_update(1, dec!(0.2))).await.unwrap();

        let err = second
            .update(Uuid::new_v4(), commission_update(1, dec!(0.1)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AppConfigError::StaleVersion {
                expected: 1,
                current: 2
            }
        ));
        // The losing write did not land
        assert_eq!(second.current().await.settings.commission_rate, dec!(0.2));
    }

    #[tokio::test]
    async fn test_invalid_settings_rejected() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let service = AppConfigService::load(store).await.unwrap();

        let err = service
            .update(Uuid::new_v4(), commission_update(1, dec!(1.5)))
            .await
            .unwrap_err();
        assert!(matches!(err, AppConfigError::Invalid(_)));
        assert_eq!(service.current().await.version, 1);
    }
}
