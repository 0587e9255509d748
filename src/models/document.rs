//! Driver onboarding documents

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Document categories a driver submits for review
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash)]
#[sqlx(type_name = "document_kind", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    License,
    VehicleRegistration,
    Insurance,
    Identity,
    ProfilePhoto,
}

impl DocumentKind {
    /// Documents that must be approved before a driver account can be approved
    pub const REQUIRED: [DocumentKind; 3] = [
        DocumentKind::License,
        DocumentKind::VehicleRegistration,
        DocumentKind::Identity,
    ];
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "document_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct DriverDocument {
    pub user_id: Uuid,
    pub kind: DocumentKind,
    pub url: String,
    pub status: DocumentStatus,
    pub reviewed_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DriverDocument {
    /// A freshly submitted document; replacing an existing one goes through this too
    pub fn submitted(user_id: Uuid, kind: DocumentKind, url: String) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            kind,
            url,
            status: DocumentStatus::Pending,
            reviewed_by: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Request to submit or replace a document; the file is already hosted
#[derive(Debug, Deserialize, Validate)]
pub struct UploadDocumentRequest {
    pub kind: DocumentKind,
    #[validate(url)]
    pub url: String,
}

/// Admin verdict on a single document
#[derive(Debug, Deserialize)]
pub struct ReviewDocumentRequest {
    pub status: DocumentStatus,
}
