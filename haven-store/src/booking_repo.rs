use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use haven_core::repository::{BookingRepository, StoreTransaction, TransactionalStore};
use haven_core::{
    Booking, BookingStatus, GuestCounts, GuestInfo, LedgerEntry, PaymentRecord, PaymentStatus,
    PaymentUpdate, PriceBreakdown, StoreError, StoreResult,
};
use haven_shared::Masked;
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::database::store_error;

const BOOKING_COLUMNS: &str = r#"
    id, property_id, user_id, guest_name, guest_email, guest_phone,
    check_in, check_out, nights, adults, children, infants,
    base_amount, cleaning_fee, service_fee, taxes, total_amount, currency,
    status, payment_status, payment_method, payment_intent_id, payment_amount,
    payment_receipt_url, payment_processed_at, special_requests, created_at, updated_at
"#;

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_where(&self, clause: &str, arg: Option<&str>) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {} FROM bookings {} ORDER BY created_at DESC",
            BOOKING_COLUMNS, clause
        );
        let mut query = sqlx::query_as::<_, BookingRow>(&sql);
        if let Some(arg) = arg {
            query = query.bind(arg);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(store_error)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    property_id: String,
    user_id: String,
    guest_name: String,
    guest_email: String,
    guest_phone: Option<String>,
    check_in: NaiveDate,
    check_out: NaiveDate,
    nights: i32,
    adults: i32,
    children: i32,
    infants: i32,
    base_amount: i64,
    cleaning_fee: i64,
    service_fee: i64,
    taxes: i64,
    total_amount: i64,
    currency: String,
    status: String,
    payment_status: String,
    payment_method: Option<String>,
    payment_intent_id: Option<String>,
    payment_amount: Option<i64>,
    payment_receipt_url: Option<String>,
    payment_processed_at: Option<DateTime<Utc>>,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> StoreResult<Booking> {
        let status = BookingStatus::parse(&self.status)
            .ok_or_else(|| StoreError::Backend(format!("unknown booking status {}", self.status)))?;
        let payment_status = PaymentStatus::parse(&self.payment_status).ok_or_else(|| {
            StoreError::Backend(format!("unknown payment status {}", self.payment_status))
        })?;

        Ok(Booking {
            id: self.id,
            property_id: self.property_id,
            guest: GuestInfo {
                user_id: self.user_id,
                name: self.guest_name,
                email: Masked(self.guest_email),
                phone: self.guest_phone.map(Masked),
            },
            check_in: self.check_in,
            check_out: self.check_out,
            nights: self.nights as u32,
            guests: GuestCounts {
                adults: self.adults as u32,
                children: self.children as u32,
                infants: self.infants as u32,
            },
            pricing: PriceBreakdown {
                base: self.base_amount,
                cleaning_fee: self.cleaning_fee,
                service_fee: self.service_fee,
                taxes: self.taxes,
                total: self.total_amount,
                currency: self.currency,
            },
            status,
            payment: PaymentRecord {
                status: payment_status,
                method: self.payment_method,
                intent_id: self.payment_intent_id,
                amount: self.payment_amount,
                receipt_url: self.payment_receipt_url,
                processed_at: self.payment_processed_at,
            },
            special_requests: self.special_requests,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// A SERIALIZABLE Postgres transaction. The unique `(property_id, date)`
/// constraint backs up the isolation level for blind inserts.
pub struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn blocked_dates(
        &mut self,
        property_id: &str,
        dates: &[NaiveDate],
    ) -> StoreResult<Vec<NaiveDate>> {
        sqlx::query_scalar::<_, NaiveDate>(
            r#"
            SELECT date FROM availability
            WHERE property_id = $1 AND date = ANY($2) AND blocked
            ORDER BY date
            FOR UPDATE
            "#,
        )
        .bind(property_id)
        .bind(dates)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_error)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, property_id, user_id, guest_name, guest_email, guest_phone,
                check_in, check_out, nights, adults, children, infants,
                base_amount, cleaning_fee, service_fee, taxes, total_amount, currency,
                status, payment_status, payment_method, special_requests, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.property_id)
        .bind(&booking.guest.user_id)
        .bind(&booking.guest.name)
        .bind(booking.guest.email.expose())
        .bind(booking.guest.phone.as_ref().map(|p| p.expose().clone()))
        .bind(booking.check_in)
        .bind(booking.check_out)
        .bind(booking.nights as i32)
        .bind(booking.guests.adults as i32)
        .bind(booking.guests.children as i32)
        .bind(booking.guests.infants as i32)
        .bind(booking.pricing.base)
        .bind(booking.pricing.cleaning_fee)
        .bind(booking.pricing.service_fee)
        .bind(booking.pricing.taxes)
        .bind(booking.pricing.total)
        .bind(&booking.pricing.currency)
        .bind(booking.status.as_str())
        .bind(booking.payment.status.as_str())
        .bind(&booking.payment.method)
        .bind(&booking.special_requests)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn insert_ledger_entries(&mut self, entries: &[LedgerEntry]) -> StoreResult<()> {
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO availability (property_id, date, blocked, booking_id, reason, note, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
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
            .execute(&mut *self.tx)
            .await
            .map_err(store_error)?;
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await.map_err(store_error)
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        self.tx.rollback().await.map_err(store_error)
    }
}

#[async_trait]
impl TransactionalStore for PgBookingRepository {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        let mut tx = self.pool.begin().await.map_err(store_error)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(store_error)?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {} FROM bookings WHERE id = $1", BOOKING_COLUMNS);
        let row = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_error)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Booking>> {
        self.fetch_where("WHERE user_id = $1", Some(user_id)).await
    }

    async fn list_by_property(&self, property_id: &str) -> StoreResult<Vec<Booking>> {
        self.fetch_where("WHERE property_id = $1", Some(property_id)).await
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        self.fetch_where("", None).await
    }

    async fn list_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        self.fetch_where("WHERE status = $1", Some(status.as_str())).await
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query("UPDATE bookings SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_payment(
        &self,
        id: Uuid,
        update: &PaymentUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                payment_status = $2,
                payment_intent_id = COALESCE($3, payment_intent_id),
                payment_amount = COALESCE($4, payment_amount),
                payment_receipt_url = COALESCE($5, payment_receipt_url),
                payment_processed_at = $6,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(update.status.as_str())
        .bind(&update.intent_id)
        .bind(update.amount)
        .bind(&update.receipt_url)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
