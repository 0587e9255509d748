use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;

use super::PgStore;
use crate::store::{StoreError, StoreResult, WalletRepo};
use crate::wallet::{
    PayoutRequest, RequestStatus, Review, TopUpRequest, TransactionKind, Transfer,
    WalletTransaction,
};

/// Add `amount` (signed) to a user's balance and append the ledger row.
/// Must run inside a transaction; the user row stays locked until commit.
pub(super) async fn post_to_wallet(
    conn: &mut PgConnection,
    user_id: Uuid,
    amount: Decimal,
    kind: TransactionKind,
    reference_id: Option<Uuid>,
) -> StoreResult<WalletTransaction> {
    let balance: Decimal =
        sqlx::query_scalar("SELECT wallet_balance FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("User {}", user_id)))?;

    let balance_after = balance + amount;
    if balance_after < Decimal::ZERO {
        return Err(StoreError::InsufficientFunds {
            available: balance,
            requested: -amount,
        });
    }

    sqlx::query("UPDATE users SET wallet_balance = $1, updated_at = NOW() WHERE id = $2")
        .bind(balance_after)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;

    let tx = WalletTransaction::new(user_id, amount, kind, reference_id, balance_after);
    let stored = sqlx::query_as::<_, WalletTransaction>(
        r#"
        INSERT INTO wallet_transactions
            (id, user_id, amount, kind, reference_id, balance_after, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING *
        "#,
    )
    .bind(tx.id)
    .bind(tx.user_id)
    .bind(tx.amount)
    .bind(tx.kind)
    .bind(tx.reference_id)
    .bind(tx.balance_after)
    .bind(tx.created_at)
    .fetch_one(&mut *conn)
    .await?;

    Ok(stored)
}

fn already_resolved(what: &str, id: Uuid, status: RequestStatus) -> StoreError {
    StoreError::Conflict(format!("{} {} is already {:?}", what, id, status))
}

#[async_trait]
impl WalletRepo for PgStore {
    async fn insert_top_up(&self, request: &TopUpRequest) -> StoreResult<TopUpRequest> {
        let stored = sqlx::query_as::<_, TopUpRequest>(
            r#"
            INSERT INTO top_up_requests
                (id, user_id, amount, status, note, reviewed_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.amount)
        .bind(request.status)
        .bind(&request.note)
        .bind(request.reviewed_by)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn get_top_up(&self, id: Uuid) -> StoreResult<TopUpRequest> {
        sqlx::query_as::<_, TopUpRequest>("SELECT * FROM top_up_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Top-up request {}", id)))
    }

    async fn list_top_ups(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<TopUpRequest>> {
        let requests = sqlx::query_as::<_, TopUpRequest>(
            r#"
            SELECT * FROM top_up_requests
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::request_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn resolve_top_up(
        &self,
        id: Uuid,
        review: Review,
        reviewer: Uuid,
        note: Option<String>,
    ) -> StoreResult<TopUpRequest> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, TopUpRequest>(
            "SELECT * FROM top_up_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Top-up request {}", id)))?;

        if request.status != RequestStatus::Pending {
            return Err(already_resolved("Top-up request", id, request.status));
        }

        let status = match review {
            Review::Approve => {
                post_to_wallet(
                    &mut tx,
                    request.user_id,
                    request.amount,
                    TransactionKind::TopUp,
                    Some(request.id),
                )
                .await?;
                RequestStatus::Completed
            }
            Review::Reject => RequestStatus::Rejected,
        };

        let resolved = sqlx::query_as::<_, TopUpRequest>(
            r#"
            UPDATE top_up_requests
            SET status = $1, reviewed_by = $2, note = COALESCE($3, note), updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(reviewer)
        .bind(note)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(resolved)
    }

    async fn insert_payout(&self, request: &PayoutRequest) -> StoreResult<PayoutRequest> {
        let stored = sqlx::query_as::<_, PayoutRequest>(
            r#"
            INSERT INTO payout_requests
                (id, user_id, amount, destination, status, note, reviewed_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(request.id)
        .bind(request.user_id)
        .bind(request.amount)
        .bind(&request.destination)
        .bind(request.status)
        .bind(&request.note)
        .bind(request.reviewed_by)
        .bind(request.created_at)
        .bind(request.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn get_payout(&self, id: Uuid) -> StoreResult<PayoutRequest> {
        sqlx::query_as::<_, PayoutRequest>("SELECT * FROM payout_requests WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Payout request {}", id)))
    }

    async fn list_payouts(
        &self,
        user_id: Option<Uuid>,
        status: Option<RequestStatus>,
    ) -> StoreResult<Vec<PayoutRequest>> {
        let requests = sqlx::query_as::<_, PayoutRequest>(
            r#"
            SELECT * FROM payout_requests
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::request_status IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }

    async fn resolve_payout(
        &self,
        id: Uuid,
        review: Review,
        reviewer: Uuid,
        note: Option<String>,
    ) -> StoreResult<PayoutRequest> {
        let mut tx = self.pool.begin().await?;

        let request = sqlx::query_as::<_, PayoutRequest>(
            "SELECT * FROM payout_requests WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("Payout request {}", id)))?;

        if request.status != RequestStatus::Pending {
            return Err(already_resolved("Payout request", id, request.status));
        }

        let status = match review {
            Review::Approve => {
                post_to_wallet(
                    &mut tx,
                    request.user_id,
                    -request.amount,
                    TransactionKind::Payout,
                    Some(request.id),
                )
                .await?;
                RequestStatus::Completed
            }
            Review::Reject => RequestStatus::Rejected,
        };

        let resolved = sqlx::query_as::<_, PayoutRequest>(
            r#"
            UPDATE payout_requests
            SET status = $1, reviewed_by = $2, note = COALESCE($3, note), updated_at = $4
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(status)
        .bind(reviewer)
        .bind(note)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(resolved)
    }

    async fn transfer(&self, from: Uuid, to: Uuid, amount: Decimal) -> StoreResult<Transfer> {
        let mut tx = self.pool.begin().await?;

        // Lock both rows in a fixed order so opposing transfers cannot deadlock
        let locked: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(vec![from, to])
                .fetch_all(&mut *tx)
                .await?;
        for id in [from, to] {
            if !locked.contains(&id) {
                return Err(StoreError::NotFound(format!("User {}", id)));
            }
        }

        let debit = post_to_wallet(
            &mut tx,
            from,
            -amount,
            TransactionKind::ManualTopUpDebit,
            Some(to),
        )
        .await?;
        let credit = post_to_wallet(
            &mut tx,
            to,
            amount,
            TransactionKind::ManualTopUpCredit,
            Some(from),
        )
        .await?;

        tx.commit().await?;

        Ok(Transfer { debit, credit })
    }

    async fn list_transactions(&self, user_id: Uuid) -> StoreResult<Vec<WalletTransaction>> {
        let txs = sqlx::query_as::<_, WalletTransaction>(
            "SELECT * FROM wallet_transactions WHERE user_id = $1 ORDER BY created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(txs)
    }
}
