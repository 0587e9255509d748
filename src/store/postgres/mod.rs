//! PostgreSQL store
//!
//! Conditional writes are single `UPDATE ... WHERE` statements; anything that
//! touches more than one row runs in a transaction and locks the rows it reads
//! with `FOR UPDATE`.

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Store, StoreError, StoreResult};
use crate::db;

mod ads;
mod config;
mod notifications;
mod rides;
mod users;
mod wallet;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn health_check(&self) -> StoreResult<()> {
        db::check_health(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}
