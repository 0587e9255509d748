use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use super::{
    BroadcastRequest, BroadcastSummary, Notification, PushError, PushGateway, PushMessage,
};
use crate::error::ApiError;
use crate::models::UserRole;
use crate::store::{NotificationRepo, Store, StoreError, UserRepo};

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<NotificationError> for ApiError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::Store(e) => e.into(),
        }
    }
}

/// Stores notifications and hands them to the push gateway
///
/// Push failures are logged and counted, never retried; the stored row is the
/// record of what was sent.
#[derive(Clone)]
pub struct NotificationService {
    store: Arc<dyn Store>,
    gateway: Arc<dyn PushGateway>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn Store>, gateway: Arc<dyn PushGateway>) -> Self {
        Self { store, gateway }
    }

    pub async fn broadcast(
        &self,
        admin_id: Uuid,
        request: BroadcastRequest,
    ) -> Result<BroadcastSummary, NotificationError> {
        let recipients = self.store.users_with_device_token(request.role).await?;
        let notification = self
            .store
            .insert_notification(&Notification::broadcast(
                request.role,
                request.title.clone(),
                request.body.clone(),
            ))
            .await?;

        let tokens: Vec<String> = recipients.into_iter().map(|(_, token)| token).collect();
        let (delivered, failed) = self.push(tokens.clone(), request.title, request.body).await;

        tracing::info!(
            notification_id = %notification.id,
            admin_id = %admin_id,
            recipients = tokens.len(),
            delivered,
            failed,
            "Broadcast sent"
        );

        Ok(BroadcastSummary {
            notification_id: notification.id,
            recipients: tokens.len(),
            delivered,
            failed,
        })
    }

    /// Store a notification for one user and push it to their device, if any
    pub async fn notify_user(
        &self,
        user_id: Uuid,
        title: &str,
        body: &str,
    ) -> Result<Notification, NotificationError> {
        let notification = self
            .store
            .insert_notification(&Notification::to_user(
                user_id,
                title.to_string(),
                body.to_string(),
            ))
            .await?;

        if let Some(token) = self.store.get_user(user_id).await?.device_token {
            self.push(vec![token], title.to_string(), body.to_string())
                .await;
        }

        Ok(notification)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        role: UserRole,
    ) -> Result<Vec<Notification>, NotificationError> {
        Ok(self.store.list_notifications(user_id, role).await?)
    }

    pub async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Notification, NotificationError> {
        Ok(self.store.mark_notification_read(id, user_id).await?)
    }

    /// Returns (delivered, failed) token counts
    async fn push(&self, tokens: Vec<String>, title: String, body: String) -> (usize, usize) {
        if tokens.is_empty() {
            return (0, 0);
        }
        let count = tokens.len();
        let message = PushMessage {
            tokens,
            title,
            body,
        };

        match self.gateway.send(&message).await {
            Ok(report) => {
                for failure in &report.failures {
                    tracing::warn!(
                        token = %redact_token(&failure.token),
                        error = failure.error.as_deref().unwrap_or("unknown"),
                        "Push delivery failed"
                    );
                }
                (report.success_count, report.failures.len())
            }
            Err(e) => {
                log_push_error(&e, count);
                (0, count)
            }
        }
    }
}

/// Device tokens are credentials; logs only carry their tail
fn redact_token(token: &str) -> String {
    let tail: String = token
        .chars()
        .rev()
        .take(6)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    if tail.chars().count() < token.chars().count() {
        format!("...{}", tail)
    } else {
        "...".to_string()
    }
}

fn log_push_error(err: &PushError, recipients: usize) {
    tracing::error!(recipients, "Push gateway call failed: {}", err);
}
