use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::availability::LedgerEntry;
use crate::booking::{Booking, BookingStatus, PaymentUpdate};
use crate::error::StoreResult;
use crate::notification::AdminNotification;
use crate::pricing::PricingRule;

/// One atomic, isolated unit of work spanning bookings and the ledger.
///
/// Dropping a transaction without committing discards every write made
/// through it. `commit` fails with `StoreError::Conflict` when a concurrent
/// transaction committed a write to anything this one read.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Nights among `dates` that already carry a block. Always read from the store.
    async fn blocked_dates(
        &mut self,
        property_id: &str,
        dates: &[NaiveDate],
    ) -> StoreResult<Vec<NaiveDate>>;

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;

    async fn insert_ledger_entries(&mut self, entries: &[LedgerEntry]) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}

#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

/// Booking records. Lists are ordered by creation time, newest first.
#[async_trait]
pub trait BookingRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Booking>>;

    async fn list_by_property(&self, property_id: &str) -> StoreResult<Vec<Booking>>;

    async fn list_all(&self) -> StoreResult<Vec<Booking>>;

    async fn list_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>>;

    /// Does not touch the ledger.
    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    async fn update_payment(
        &self,
        id: Uuid,
        update: &PaymentUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<()>;

    /// Hard delete. Does not touch the ledger.
    async fn delete(&self, id: Uuid) -> StoreResult<()>;
}

/// Non-transactional ledger access.
#[async_trait]
pub trait AvailabilityRepository: Send + Sync {
    /// Advisory only; the booking transaction re-checks.
    async fn is_range_free(
        &self,
        property_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<bool>;

    /// Removes every entry owned by the booking and returns how many went.
    async fn unblock_for_booking(&self, booking_id: Uuid) -> StoreResult<u64>;

    /// Upserts the entries without conflict checks; the last write wins.
    async fn manual_block(&self, entries: &[LedgerEntry]) -> StoreResult<()>;

    async fn manual_unblock(&self, property_id: &str, dates: &[NaiveDate]) -> StoreResult<u64>;

    /// Blocked entries between `start` and `end`, both inclusive.
    async fn calendar(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<BTreeMap<NaiveDate, LedgerEntry>>;
}

#[async_trait]
pub trait PricingRuleRepository: Send + Sync {
    async fn create(&self, rule: &PricingRule) -> StoreResult<()>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<PricingRule>>;

    async fn update(&self, rule: &PricingRule) -> StoreResult<()>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    /// Newest first.
    async fn list_for_property(&self, property_id: &str) -> StoreResult<Vec<PricingRule>>;
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn create(&self, notification: &AdminNotification) -> StoreResult<()>;

    /// Newest first.
    async fn list(&self, limit: Option<usize>, unread_only: bool)
        -> StoreResult<Vec<AdminNotification>>;

    async fn mark_read(&self, id: Uuid) -> StoreResult<()>;

    async fn mark_all_read(&self) -> StoreResult<u64>;

    async fn unread_count(&self) -> StoreResult<u64>;
}
