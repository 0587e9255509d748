use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::ads::{AdAudience, Advertisement, ListAdsQuery};
use crate::store::{AdRepo, StoreError, StoreResult};

fn ad_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("Advertisement {}", id))
}

async fn deactivate_audience(
    conn: &mut sqlx::PgConnection,
    audience: AdAudience,
    except: Uuid,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        UPDATE advertisements
        SET is_active = FALSE, updated_at = NOW()
        WHERE audience = $1 AND id <> $2 AND is_active
        "#,
    )
    .bind(audience)
    .bind(except)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

// The partial unique index on (audience) WHERE is_active backs these up: a
// concurrent activation that slips past the UPDATE fails with a conflict.
#[async_trait]
impl AdRepo for PgStore {
    async fn insert_ad(&self, ad: &Advertisement) -> StoreResult<Advertisement> {
        let mut tx = self.pool.begin().await?;

        if ad.is_active {
            deactivate_audience(&mut tx, ad.audience, ad.id).await?;
        }

        let stored = sqlx::query_as::<_, Advertisement>(
            r#"
            INSERT INTO advertisements
                (id, title, image_url, link_url, audience, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(ad.id)
        .bind(&ad.title)
        .bind(&ad.image_url)
        .bind(&ad.link_url)
        .bind(ad.audience)
        .bind(ad.is_active)
        .bind(ad.created_at)
        .bind(ad.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(stored)
    }

    async fn get_ad(&self, id: Uuid) -> StoreResult<Advertisement> {
        sqlx::query_as::<_, Advertisement>("SELECT * FROM advertisements WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ad_not_found(id))
    }

    async fn update_ad(&self, ad: &Advertisement) -> StoreResult<Advertisement> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Advertisement>(
            "SELECT * FROM advertisements WHERE id = $1 FOR UPDATE",
        )
        .bind(ad.id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ad_not_found(ad.id))?;

        if current.is_active && current.audience != ad.audience {
            deactivate_audience(&mut tx, ad.audience, ad.id).await?;
        }

        let updated = sqlx::query_as::<_, Advertisement>(
            r#"
            UPDATE advertisements
            SET title = $2, image_url = $3, link_url = $4, audience = $5, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(ad.id)
        .bind(&ad.title)
        .bind(&ad.image_url)
        .bind(&ad.link_url)
        .bind(ad.audience)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn delete_ad(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM advertisements WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ad_not_found(id));
        }
        Ok(())
    }

    async fn list_ads(&self, query: &ListAdsQuery) -> StoreResult<Vec<Advertisement>> {
        let ads = sqlx::query_as::<_, Advertisement>(
            r#"
            SELECT * FROM advertisements
            WHERE ($1::ad_audience IS NULL OR audience = $1)
              AND ($2::boolean IS NULL OR is_active = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(query.audience)
        .bind(query.active)
        .fetch_all(&self.pool)
        .await?;

        Ok(ads)
    }

    async fn set_ad_active(&self, id: Uuid, active: bool) -> StoreResult<Advertisement> {
        let mut tx = self.pool.begin().await?;

        let ad = sqlx::query_as::<_, Advertisement>(
            "SELECT * FROM advertisements WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| ad_not_found(id))?;

        if active {
            deactivate_audience(&mut tx, ad.audience, id).await?;
        }

        let updated = sqlx::query_as::<_, Advertisement>(
            "UPDATE advertisements SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(active)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(updated)
    }

    async fn active_ads_for(&self, audience: AdAudience) -> StoreResult<Vec<Advertisement>> {
        let ads = sqlx::query_as::<_, Advertisement>(
            "SELECT * FROM advertisements WHERE audience = $1 AND is_active",
        )
        .bind(audience)
        .fetch_all(&self.pool)
        .await?;

        Ok(ads)
    }
}
