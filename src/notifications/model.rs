use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::UserRole;

/// A stored notification; `user_id` is `None` for broadcasts
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    /// Broadcasts limited to one role
    pub role: Option<UserRole>,
    pub title: String,
    pub body: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn to_user(user_id: Uuid, title: String, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: Some(user_id),
            role: None,
            title,
            body,
            read: false,
            created_at: Utc::now(),
        }
    }

    pub fn broadcast(role: Option<UserRole>, title: String, body: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            role,
            title,
            body,
            read: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct BroadcastRequest {
    #[validate(length(min = 1, max = 100))]
    pub title: String,
    #[validate(length(min = 1, max = 1000))]
    pub body: String,
    /// Limit delivery to one role; everyone with a device token otherwise
    pub role: Option<UserRole>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct BroadcastSummary {
    pub notification_id: Uuid,
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}
