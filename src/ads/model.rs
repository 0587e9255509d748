//! Advertisement models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::models::UserRole;

/// Which app an advertisement shows in
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "ad_audience", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AdAudience {
    Customer,
    Driver,
    All,
}

impl AdAudience {
    /// Whether a user with `role` sees ads targeted at this audience
    pub fn includes(&self, role: UserRole) -> bool {
        match self {
            AdAudience::All => true,
            AdAudience::Customer => role == UserRole::Customer,
            AdAudience::Driver => role == UserRole::Driver,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Advertisement {
    pub id: Uuid,
    pub title: String,
    pub image_url: String,
    pub link_url: Option<String>,
    pub audience: AdAudience,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAdRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
    #[validate(url)]
    pub image_url: String,
    #[validate(url)]
    pub link_url: Option<String>,
    pub audience: AdAudience,
    /// Created inactive unless set
    #[serde(default)]
    pub is_active: bool,
}

#[derive(Debug, Deserialize, Validate, Default)]
pub struct UpdateAdRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub link_url: Option<String>,
    pub audience: Option<AdAudience>,
}

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ListAdsQuery {
    pub audience: Option<AdAudience>,
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audience_includes_role() {
        assert!(AdAudience::All.includes(UserRole::Driver));
        assert!(AdAudience::Driver.includes(UserRole::Driver));
        assert!(!AdAudience::Driver.includes(UserRole::Customer));
        assert!(!AdAudience::Customer.includes(UserRole::Admin));
    }
}
