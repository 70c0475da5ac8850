use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use haven_core::repository::AvailabilityRepository;
use haven_core::{BlockReason, LedgerEntry, StoreResult};
use sqlx::PgPool;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::database::store_error;

pub struct PgAvailabilityRepository {
    pool: PgPool,
}

impl PgAvailabilityRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct LedgerRow {
    property_id: String,
    date: NaiveDate,
    blocked: bool,
    booking_id: Option<Uuid>,
    reason: Option<String>,
    note: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<LedgerRow> for LedgerEntry {
    fn from(row: LedgerRow) -> Self {
        LedgerEntry {
            property_id: row.property_id,
            date: row.date,
            blocked: row.blocked,
            booking_id: row.booking_id,
            reason: row.reason.as_deref().and_then(BlockReason::parse),
            note: row.note,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl AvailabilityRepository for PgAvailabilityRepository {
    async fn is_range_free(
        &self,
        property_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<bool> {
        let taken: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM availability
            WHERE property_id = $1 AND date >= $2 AND date < $3 AND blocked
            "#,
        )
        .bind(property_id)
        .bind(check_in)
        .bind(check_out)
        .fetch_one(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(taken == 0)
    }

    async fn unblock_for_booking(&self, booking_id: Uuid) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM availability WHERE booking_id = $1")
            .bind(booking_id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn manual_block(&self, entries: &[LedgerEntry]) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO availability (property_id, date, blocked, booking_id, reason, note, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ON CONFLICT (property_id, date) DO UPDATE SET
                    blocked = EXCLUDED.blocked,
                    booking_id = EXCLUDED.booking_id,
                    reason = EXCLUDED.reason,
                    note = EXCLUDED.note,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&entry.property_id)
            .bind(entry.date)
            .bind(entry.blocked)
            .bind(entry.booking_id)
            .bind(entry.reason.map(|r| r.as_str()))
            .bind(&entry.note)
            .bind(entry.created_at)
            .bind(entry.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        }
        tx.commit().await.map_err(store_error)
    }

    async fn manual_unblock(&self, property_id: &str, dates: &[NaiveDate]) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM availability WHERE property_id = $1 AND date = ANY($2)")
            .bind(property_id)
            .bind(dates)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn calendar(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<BTreeMap<NaiveDate, LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(
            r#"
            SELECT property_id, date, blocked, booking_id, reason, note, created_at, updated_at
            FROM availability
            WHERE property_id = $1 AND date BETWEEN $2 AND $3 AND blocked
            ORDER BY date
            "#,
        )
        .bind(property_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;

        Ok(rows
            .into_iter()
            .map(|row| (row.date, LedgerEntry::from(row)))
            .collect())
    }
}
