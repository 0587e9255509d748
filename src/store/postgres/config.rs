use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use super::PgStore;
use crate::app_config::{AppConfig, AppSettings};
use crate::store::{ConfigRepo, StoreError, StoreResult};

/// `app_config` holds a single row with id 1
#[derive(sqlx::FromRow)]
struct ConfigRow {
    version: i64,
    settings: Json<AppSettings>,
    updated_by: Option<Uuid>,
    updated_at: DateTime<Utc>,
}

impl From<ConfigRow> for AppConfig {
    fn from(row: ConfigRow) -> Self {
        Self {
            version: row.version,
            settings: row.settings.0,
            updated_by: row.updated_by,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl ConfigRepo for PgStore {
    async fn load_config(&self) -> StoreResult<Option<AppConfig>> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT version, settings, updated_by, updated_at FROM app_config WHERE id = 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::ColumnDecode { .. }) {
                StoreError::Corrupt(e.to_string())
            } else {
                e.into()
            }
        })?;

        Ok(row.map(AppConfig::from))
    }

    async fn save_config(
        &self,
        config: &AppConfig,
        expected_version: i64,
    ) -> StoreResult<AppConfig> {
        let result = if expected_version == 0 {
            sqlx::query(
                r#"
                INSERT INTO app_config (id, version, settings, updated_by, updated_at)
                VALUES (1, $1, $2, $3, $4)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(config.version)
            .bind(Json(&config.settings))
            .bind(config.updated_by)
            .bind(config.updated_at)
            .execute(&self.pool)
            .await?
        } else {
            sqlx::query(
                r#"
                UPDATE app_config
                SET version = $1, settings = $2, updated_by = $3, updated_at = $4
                WHERE id = 1 AND version = $5
                "#,
            )
            .bind(config.version)
            .bind(Json(&config.settings))
            .bind(config.updated_by)
            .bind(config.updated_at)
            .bind(expected_version)
            .execute(&self.pool)
            .await?
        };

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict(format!(
                "Config is no longer at version {}",
                expected_version
            )));
        }

        Ok(config.clone())
    }
}
