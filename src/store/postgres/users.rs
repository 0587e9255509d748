use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::PgStore;
use crate::models::{
    ApprovalStatus, DocumentKind, DocumentStatus, DriverDocument, GeoPoint, ListUsersQuery,
    UpdateProfileRequest, User, UserRole,
};
use crate::store::{clamp_limit, StoreError, StoreResult, UserRepo};

fn user_not_found(id: Uuid) -> StoreError {
    StoreError::NotFound(format!("User {}", id))
}

#[async_trait]
impl UserRepo for PgStore {
    async fn get_user(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| user_not_found(id))
    }

    async fn ensure_user(&self, user: &User) -> StoreResult<User> {
        sqlx::query(
            r#"
            INSERT INTO users (id, email, role, approval_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(user.role)
        .bind(user.approval_status)
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        self.get_user(user.id).await
    }

    async fn update_profile(&self, id: Uuid, update: &UpdateProfileRequest) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET display_name = COALESCE($2, display_name),
                phone = COALESCE($3, phone),
                vehicle_class = COALESCE($4, vehicle_class),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.display_name)
        .bind(&update.phone)
        .bind(update.vehicle_class)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_not_found(id))
    }

    async fn list_users(&self, query: &ListUsersQuery) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT * FROM users
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::approval_status IS NULL OR approval_status = $2)
              AND ($3::boolean IS NULL OR is_online = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(query.role)
        .bind(query.approval_status)
        .bind(query.online)
        .bind(clamp_limit(query.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn set_approval_status(&self, id: Uuid, status: ApprovalStatus) -> StoreResult<User> {
        // Anyone leaving the approved state is taken offline with it
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET approval_status = $2, is_online = is_online AND $3, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(status == ApprovalStatus::Approved)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_not_found(id))
    }

    async fn set_online(&self, id: Uuid, online: bool) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET is_online = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(online)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_not_found(id))
    }

    async fn update_location(
        &self,
        id: Uuid,
        point: GeoPoint,
        at: DateTime<Utc>,
    ) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET last_lat = $2, last_lng = $3, location_updated_at = $4, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(point.lat)
        .bind(point.lng)
        .bind(at)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_not_found(id))
    }

    async fn set_device_token(&self, id: Uuid, token: Option<String>) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET device_token = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(token)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| user_not_found(id))
    }

    async fn users_with_device_token(
        &self,
        role: Option<UserRole>,
    ) -> StoreResult<Vec<(Uuid, String)>> {
        let rows = sqlx::query_as::<_, (Uuid, String)>(
            r#"
            SELECT id, device_token FROM users
            WHERE device_token IS NOT NULL
              AND ($1::user_role IS NULL OR role = $1)
            "#,
        )
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn mark_stale_drivers_offline(&self, cutoff: DateTime<Utc>) -> StoreResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET is_online = FALSE, updated_at = NOW()
            WHERE role = 'driver'
              AND is_online
              AND (location_updated_at IS NULL OR location_updated_at < $1)
            RETURNING id
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn upsert_document(&self, document: &DriverDocument) -> StoreResult<DriverDocument> {
        let stored = sqlx::query_as::<_, DriverDocument>(
            r#"
            INSERT INTO driver_documents
                (user_id, kind, url, status, reviewed_by, created_at, updated_at)
            VALUES ($1, $2, $3, 'pending', NULL, $4, $4)
            ON CONFLICT (user_id, kind) DO UPDATE
            SET url = EXCLUDED.url,
                status = 'pending',
                reviewed_by = NULL,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(document.user_id)
        .bind(document.kind)
        .bind(&document.url)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn list_documents(&self, user_id: Uuid) -> StoreResult<Vec<DriverDocument>> {
        let docs = sqlx::query_as::<_, DriverDocument>(
            "SELECT * FROM driver_documents WHERE user_id = $1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(docs)
    }

    async fn set_document_status(
        &self,
        user_id: Uuid,
        kind: DocumentKind,
        status: DocumentStatus,
        reviewer: Uuid,
    ) -> StoreResult<DriverDocument> {
        sqlx::query_as::<_, DriverDocument>(
            r#"
            UPDATE driver_documents
            SET status = $3, reviewed_by = $4, updated_at = NOW()
            WHERE user_id = $1 AND kind = $2
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(kind)
        .bind(status)
        .bind(reviewer)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Document {:?} for user {}", kind, user_id)))
    }
}
