//! API errors for Rideway
//!
//! Every handler returns [`ApiError`]. Service errors (rides, wallet, users,
//! ads, app config, notifications) convert into it through `From` impls kept
//! next to each service, so the mapping to HTTP lives with the domain rules.
//!
//! Responses share one body shape:
//!
//! ```json
//! { "error": { "code": "CONFLICT", "message": "...", "details": ["..."] } }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Lost a race or the resource moved on (ride already accepted, stale config)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Well-formed but refused by a business rule
    #[error("Unprocessable entity: {0}")]
    UnprocessableEntity(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Validation error: {0}")]
    InvalidFields(validator::ValidationErrors),

    #[error("Too many requests")]
    TooManyRequests,

    /// Store failure; the message is logged, never sent
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetails,
}

#[derive(Serialize)]
struct ErrorDetails {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl ApiError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::UnprocessableEntity(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "UNPROCESSABLE_ENTITY")
            }
            ApiError::ValidationError(_) | ApiError::InvalidFields(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            ApiError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, "TOO_MANY_REQUESTS"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    pub fn error_code(&self) -> &'static str {
        self.classify().1
    }

    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }

    /// Offending field names for validation failures
    fn details(&self) -> Vec<String> {
        match self {
            ApiError::InvalidFields(errors) => {
                let mut fields: Vec<String> =
                    errors.field_errors().keys().map(|f| f.to_string()).collect();
                fields.sort();
                fields
            }
            _ => Vec::new(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();

        let message = match &self {
            ApiError::Internal(detail) => {
                tracing::error!(error = %detail, "Request failed on a store error");
                "Internal server error".to_string()
            }
            other => {
                tracing::debug!(error = %other, code, "Request rejected");
                other.to_string()
            }
        };

        let body = ErrorBody {
            error: ErrorDetails {
                code,
                message,
                details: self.details(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ApiError::NotFound(what),
            StoreError::Conflict(what) => ApiError::Conflict(what),
            StoreError::DriverBusy(what) => ApiError::UnprocessableEntity(what),
            StoreError::InsufficientFunds {
                available,
                requested,
            } => ApiError::UnprocessableEntity(format!(
                "Insufficient balance: available {}, requested {}",
                available, requested
            )),
            StoreError::Database(msg) | StoreError::Corrupt(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::InvalidFields(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use validator::Validate;

    #[derive(Validate)]
    struct Pickup {
        #[validate(length(min = 1))]
        address: String,
        #[validate(range(min = 0.0, max = 90.0))]
        lat: f64,
    }

    #[test]
    fn test_store_errors_map_to_api_errors() {
        let conflict: ApiError = StoreError::Conflict("ride already accepted".into()).into();
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(conflict.error_code(), "CONFLICT");

        let busy: ApiError = StoreError::DriverBusy("driver already has an active ride".into()).into();
        assert_eq!(busy.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let missing: ApiError = StoreError::NotFound("ride".into()).into();
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

        let broke: ApiError = StoreError::InsufficientFunds {
            available: dec!(10),
            requested: dec!(20),
        }
        .into();
        assert_eq!(broke.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let db: ApiError = StoreError::Database("connection reset".into()).into();
        assert_eq!(db.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_invalid_fields_are_listed() {
        let errors = Pickup {
            address: String::new(),
            lat: 123.0,
        }
        .validate()
        .unwrap_err();
        let api: ApiError = errors.into();

        assert_eq!(api.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(api.error_code(), "VALIDATION_ERROR");
        assert_eq!(api.details(), vec!["address".to_string(), "lat".to_string()]);
    }

    #[test]
    fn test_rate_limited() {
        assert_eq!(
            ApiError::TooManyRequests.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }
}
