//! Authentication service
//!
//! Turns a verified identity token into a known, unblocked user. The first
//! request from a new identity creates its user record.

use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{User, UserRole};
use crate::store::{Store, StoreError, UserRepo};

use super::jwt::{verify_token, JwtError};

/// Auth service errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Token expired")]
    TokenExpired,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Token role {claimed} does not match account role {actual}")]
    RoleMismatch { claimed: UserRole, actual: UserRole },

    #[error("Account is blocked")]
    Blocked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<JwtError> for AuthError {
    fn from(e: JwtError) -> Self {
        match e {
            JwtError::TokenExpired => AuthError::TokenExpired,
            other => AuthError::InvalidToken(other.to_string()),
        }
    }
}

/// Identity resolved from a request's bearer token
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Authentication service
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn Store>,
    jwt_secret: String,
}

impl AuthService {
    pub fn new(store: Arc<dyn Store>, jwt_secret: String) -> Self {
        Self { store, jwt_secret }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.jwt_secret
    }

    /// Verify `token` and load (or create) the user it names
    pub async fn authenticate(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = verify_token(token, &self.jwt_secret)?;
        let user_id = claims.user_id()?;
        let role = claims.user_role()?;

        let user = self
            .store
            .ensure_user(&User::new(user_id, claims.email.clone(), role))
            .await?;

        if user.role != role {
            tracing::warn!(user_id = %user_id, claimed = %role, actual = %user.role, "Token role mismatch");
            return Err(AuthError::RoleMismatch {
                claimed: role,
                actual: user.role,
            });
        }
        if user.is_blocked() {
            tracing::debug!(user_id = %user_id, "Blocked user rejected");
            return Err(AuthError::Blocked);
        }

        Ok(Identity {
            user_id,
            email: claims.email,
            role,
        })
    }
}
