use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::UserRole;
use crate::notifications::Notification;
use crate::store::{NotificationRepo, StoreError, StoreResult};

#[async_trait]
impl NotificationRepo for PgStore {
    async fn insert_notification(
        &self,
        notification: &Notification,
    ) -> StoreResult<Notification> {
        let stored = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (id, user_id, role, title, body, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(notification.id)
        .bind(notification.user_id)
        .bind(notification.role)
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(notification.read)
        .bind(notification.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn list_notifications(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> StoreResult<Vec<Notification>> {
        let list = sqlx::query_as::<_, Notification>(
            r#"
            SELECT * FROM notifications
            WHERE user_id = $1
               OR (user_id IS NULL AND (role IS NULL OR role = $2))
            ORDER BY created_at DESC
            LIMIT 100
            "#,
        )
        .bind(user_id)
        .bind(role)
        .fetch_all(&self.pool)
        .await?;

        Ok(list)
    }

    async fn mark_notification_read(&self, id: Uuid, user_id: Uuid) -> StoreResult<Notification> {
        sqlx::query_as::<_, Notification>(
            "UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Notification {}", id)))
    }
}
