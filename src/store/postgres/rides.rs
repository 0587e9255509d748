use async_trait::async_trait;
use uuid::Uuid;

use super::wallet::post_to_wallet;
use super::PgStore;
use crate::ride::{ListRidesQuery, Ride, RideHistoryEntry, RideMessage};
use crate::store::{clamp_limit, RideRepo, StoreError, StoreResult, TransitionWrite};
use crate::wallet::TransactionKind;

async fn insert_history(
    conn: &mut sqlx::PgConnection,
    entry: &RideHistoryEntry,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO ride_history
            (id, ride_id, from_status, to_status, actor_id, actor_role, version, note, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.id)
    .bind(entry.ride_id)
    .bind(entry.from_status)
    .bind(entry.to_status)
    .bind(entry.actor_id)
    .bind(entry.actor_role)
    .bind(entry.version)
    .bind(&entry.note)
    .bind(entry.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

#[async_trait]
impl RideRepo for PgStore {
    async fn insert_ride(&self, ride: &Ride, entry: &RideHistoryEntry) -> StoreResult<Ride> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Ride>(
            r#"
            INSERT INTO rides (
                id, customer_id, driver_id, pickup_address, pickup_lat, pickup_lng,
                dropoff_address, dropoff_lat, dropoff_lng, vehicle_class, fare, tip,
                commission, driver_earnings, status, version, cancel_reason,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)
            RETURNING *
            "#,
        )
        .bind(ride.id)
        .bind(ride.customer_id)
        .bind(ride.driver_id)
        .bind(&ride.pickup_address)
        .bind(ride.pickup_lat)
        .bind(ride.pickup_lng)
        .bind(&ride.dropoff_address)
        .bind(ride.dropoff_lat)
        .bind(ride.dropoff_lng)
        .bind(ride.vehicle_class)
        .bind(ride.fare)
        .bind(ride.tip)
        .bind(ride.commission)
        .bind(ride.driver_earnings)
        .bind(ride.status)
        .bind(ride.version)
        .bind(&ride.cancel_reason)
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .fetch_one(&mut *tx)
        .await?;

        insert_history(&mut tx, entry).await?;
        tx.commit().await?;

        Ok(stored)
    }

    async fn get_ride(&self, id: Uuid) -> StoreResult<Ride> {
        sqlx::query_as::<_, Ride>("SELECT * FROM rides WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Ride {}", id)))
    }

    async fn list_rides(&self, query: &ListRidesQuery) -> StoreResult<Vec<Ride>> {
        let rides = sqlx::query_as::<_, Ride>(
            r#"
            SELECT * FROM rides
            WHERE ($1::ride_status IS NULL OR status = $1)
              AND ($2::uuid IS NULL OR customer_id = $2)
              AND ($3::uuid IS NULL OR driver_id = $3)
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(query.status)
        .bind(query.customer_id)
        .bind(query.driver_id)
        .bind(clamp_limit(query.limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rides)
    }

    async fn apply_transition(&self, write: TransitionWrite) -> StoreResult<Ride> {
        let mut tx = self.pool.begin().await?;
        let ride = &write.ride;

        let updated = sqlx::query_as::<_, Ride>(
            r#"
            UPDATE rides
            SET driver_id = $1, vehicle_class = $2, fare = $3, tip = $4, commission = $5,
                driver_earnings = $6, status = $7, version = $8, cancel_reason = $9,
                updated_at = $10
            WHERE id = $11 AND version = $12 AND status = $13
            RETURNING *
            "#,
        )
        .bind(ride.driver_id)
        .bind(ride.vehicle_class)
        .bind(ride.fare)
        .bind(ride.tip)
        .bind(ride.commission)
        .bind(ride.driver_earnings)
        .bind(ride.status)
        .bind(ride.version)
        .bind(&ride.cancel_reason)
        .bind(ride.updated_at)
        .bind(ride.id)
        .bind(write.expected_version)
        .bind(write.expected_status)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(updated) = updated else {
            let current: Option<i64> = sqlx::query_scalar("SELECT version FROM rides WHERE id = $1")
                .bind(ride.id)
                .fetch_optional(&mut *tx)
                .await?;
            return Err(match current {
                None => StoreError::NotFound(format!("Ride {}", ride.id)),
                Some(version) => StoreError::Conflict(format!(
                    "Ride {} changed concurrently (now at version {})",
                    ride.id, version
                )),
            });
        };

        insert_history(&mut tx, &write.entry).await?;

        if let Some(settlement) = &write.settlement {
            let driver_id = updated
                .driver_id
                .ok_or_else(|| StoreError::Corrupt(format!("Ride {} has no driver", ride.id)))?;
            post_to_wallet(
                &mut tx,
                driver_id,
                settlement.driver_earnings,
                TransactionKind::RideEarning,
                Some(ride.id),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::debug!(ride_id = %updated.id, version = updated.version, "Ride transition committed");

        Ok(updated)
    }

    async fn ride_history(&self, ride_id: Uuid) -> StoreResult<Vec<RideHistoryEntry>> {
        let entries = sqlx::query_as::<_, RideHistoryEntry>(
            "SELECT * FROM ride_history WHERE ride_id = $1 ORDER BY version ASC",
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    async fn insert_message(&self, message: &RideMessage) -> StoreResult<RideMessage> {
        let stored = sqlx::query_as::<_, RideMessage>(
            r#"
            INSERT INTO ride_messages (id, ride_id, sender_id, body, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(message.id)
        .bind(message.ride_id)
        .bind(message.sender_id)
        .bind(&message.body)
        .bind(message.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(stored)
    }

    async fn list_messages(&self, ride_id: Uuid) -> StoreResult<Vec<RideMessage>> {
        let messages = sqlx::query_as::<_, RideMessage>(
            "SELECT * FROM ride_messages WHERE ride_id = $1 ORDER BY created_at ASC",
        )
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(messages)
    }
}
