//! In-process store implementing every repository trait.
//!
//! Transactions are optimistic: each `(property, date)` key carries a version
//! that bumps on every ledger write. A transaction remembers the version of
//! each key it read and `commit` refuses to apply if any of them moved, so the
//! first committer wins and later ones get `StoreError::Conflict`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use haven_core::dates::{dates_in_range, dates_inclusive};
use haven_core::mail::{EmailSink, OutboundEmail};
use haven_core::repository::{
    AvailabilityRepository, BookingRepository, NotificationRepository, PricingRuleRepository,
    StoreTransaction, TransactionalStore,
};
use haven_core::{
    AdminNotification, Booking, BookingStatus, LedgerEntry, PaymentUpdate, PricingRule,
    StoreError, StoreResult,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

type LedgerKey = (String, NaiveDate);

#[derive(Default)]
struct MemoryState {
    seq: u64,
    bookings: HashMap<Uuid, (u64, Booking)>,
    ledger: HashMap<LedgerKey, LedgerEntry>,
    versions: HashMap<LedgerKey, u64>,
    pricing_rules: HashMap<Uuid, (u64, PricingRule)>,
    notifications: HashMap<Uuid, (u64, AdminNotification)>,
    outbox: Vec<(Uuid, OutboundEmail)>,
}

impl MemoryState {
    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    fn version(&self, key: &LedgerKey) -> u64 {
        self.versions.get(key).copied().unwrap_or(0)
    }

    fn bump(&mut self, key: LedgerKey) {
        *self.versions.entry(key).or_insert(0) += 1;
    }

    fn bookings_where(&self, pred: impl Fn(&Booking) -> bool) -> Vec<Booking> {
        let mut rows: Vec<&(u64, Booking)> = self.bookings.values().filter(|(_, b)| pred(b)).collect();
        rows.sort_by(|a, b| (b.1.created_at, b.0).cmp(&(a.1.created_at, a.0)));
        rows.into_iter().map(|(_, b)| b.clone()).collect()
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    unavailable: Arc<AtomicBool>,
    forced_conflicts: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails with `StoreError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// The next `count` commits fail with `StoreError::Conflict`.
    pub fn force_conflicts(&self, count: usize) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    /// Every ledger entry, for assertions.
    pub async fn ledger_snapshot(&self) -> Vec<LedgerEntry> {
        let state = self.state.read().await;
        let mut entries: Vec<LedgerEntry> = state.ledger.values().cloned().collect();
        entries.sort_by(|a, b| (&a.property_id, a.date).cmp(&(&b.property_id, b.date)));
        entries
    }

    pub async fn booking_count(&self) -> usize {
        self.state.read().await.bookings.len()
    }

    pub async fn outbox(&self) -> Vec<OutboundEmail> {
        let state = self.state.read().await;
        state.outbox.iter().map(|(_, email)| email.clone()).collect()
    }

    fn check(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".to_string()));
        }
        Ok(())
    }
}

pub struct MemoryTransaction {
    store: MemoryStore,
    reads: HashMap<LedgerKey, u64>,
    bookings: Vec<Booking>,
    entries: Vec<LedgerEntry>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn blocked_dates(
        &mut self,
        property_id: &str,
        dates: &[NaiveDate],
    ) -> StoreResult<Vec<NaiveDate>> {
        self.store.check()?;
        let state = self.store.state.read().await;
        let mut blocked = Vec::new();
        for date in dates {
            let key = (property_id.to_string(), *date);
            let version = state.version(&key);
            self.reads.entry(key.clone()).or_insert(version);
            if state.ledger.contains_key(&key) {
                blocked.push(*date);
            }
        }
        Ok(blocked)
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.store.check()?;
        self.bookings.push(booking.clone());
        Ok(())
    }

    async fn insert_ledger_entries(&mut self, entries: &[LedgerEntry]) -> StoreResult<()> {
        self.store.check()?;
        self.entries.extend_from_slice(entries);
        Ok(())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryTransaction {
            store,
            reads,
            bookings,
            entries,
        } = *self;
        store.check()?;
        let forced = store
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if forced.is_ok() {
            return Err(StoreError::Conflict);
        }

        let mut state = store.state.write().await;

        // 1. Validate every read
        for (key, seen) in &reads {
            if state.version(key) != *seen {
                return Err(StoreError::Conflict);
            }
        }

        // 2. One block per (property, date)
        for entry in &entries {
            let key = (entry.property_id.clone(), entry.date);
            if state.ledger.contains_key(&key) {
                return Err(StoreError::Conflict);
            }
        }

        // 3. Apply
        for booking in bookings {
            let seq = state.next_seq();
            state.bookings.insert(booking.id, (seq, booking));
        }
        for entry in entries {
            let key = (entry.property_id.clone(), entry.date);
            state.ledger.insert(key.clone(), entry);
            state.bump(key);
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl TransactionalStore for MemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTransaction>> {
        self.check()?;
        Ok(Box::new(MemoryTransaction {
            store: self.clone(),
            reads: HashMap::new(),
            bookings: Vec::new(),
            entries: Vec::new(),
        }))
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn get(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state.bookings.get(&id).map(|(_, b)| b.clone()))
    }

    async fn list_by_user(&self, user_id: &str) -> StoreResult<Vec<Booking>> {
        self.check()?;
        Ok(self.state.read().await.bookings_where(|b| b.guest.user_id == user_id))
    }

    async fn list_by_property(&self, property_id: &str) -> StoreResult<Vec<Booking>> {
        self.check()?;
        Ok(self.state.read().await.bookings_where(|b| b.property_id == property_id))
    }

    async fn list_all(&self) -> StoreResult<Vec<Booking>> {
        self.check()?;
        Ok(self.state.read().await.bookings_where(|_| true))
    }

    async fn list_by_status(&self, status: BookingStatus) -> StoreResult<Vec<Booking>> {
        self.check()?;
        Ok(self.state.read().await.bookings_where(|b| b.status == status))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: BookingStatus,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        let (_, booking) = state.bookings.get_mut(&id).ok_or(StoreError::NotFound)?;
        booking.update_status(status, now);
        Ok(())
    }

    async fn update_payment(
        &self,
        id: Uuid,
        update: &PaymentUpdate,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        let (_, booking) = state.bookings.get_mut(&id).ok_or(StoreError::NotFound)?;
        booking.payment.merge(update, now);
        booking.updated_at = now;
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        state.bookings.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl AvailabilityRepository for MemoryStore {
    async fn is_range_free(
        &self,
        property_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> StoreResult<bool> {
        self.check()?;
        let state = self.state.read().await;
        Ok(dates_in_range(check_in, check_out)
            .into_iter()
            .all(|date| !state.ledger.contains_key(&(property_id.to_string(), date))))
    }

    async fn unblock_for_booking(&self, booking_id: Uuid) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let keys: Vec<LedgerKey> = state
            .ledger
            .iter()
            .filter(|(_, e)| e.booking_id == Some(booking_id))
            .map(|(k, _)| k.clone())
            .collect();
        for key in &keys {
            state.ledger.remove(key);
            state.bump(key.clone());
        }
        Ok(keys.len() as u64)
    }

    async fn manual_block(&self, entries: &[LedgerEntry]) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        for entry in entries {
            let key = (entry.property_id.clone(), entry.date);
            state.ledger.insert(key.clone(), entry.clone());
            state.bump(key);
        }
        Ok(())
    }

    async fn manual_unblock(&self, property_id: &str, dates: &[NaiveDate]) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let mut removed = 0;
        for date in dates {
            let key = (property_id.to_string(), *date);
            if state.ledger.remove(&key).is_some() {
                state.bump(key);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn calendar(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> StoreResult<BTreeMap<NaiveDate, LedgerEntry>> {
        self.check()?;
        let state = self.state.read().await;
        Ok(dates_inclusive(start, end)
            .into_iter()
            .filter_map(|date| {
                state
                    .ledger
                    .get(&(property_id.to_string(), date))
                    .map(|e| (date, e.clone()))
            })
            .collect())
    }
}

#[async_trait]
impl PricingRuleRepository for MemoryStore {
    async fn create(&self, rule: &PricingRule) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        let seq = state.next_seq();
        state.pricing_rules.insert(rule.id, (seq, rule.clone()));
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<PricingRule>> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state.pricing_rules.get(&id).map(|(_, r)| r.clone()))
    }

    async fn update(&self, rule: &PricingRule) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        let (_, stored) = state.pricing_rules.get_mut(&rule.id).ok_or(StoreError::NotFound)?;
        *stored = rule.clone();
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        state.pricing_rules.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }

    async fn list_for_property(&self, property_id: &str) -> StoreResult<Vec<PricingRule>> {
        self.check()?;
        let state = self.state.read().await;
        let mut rows: Vec<&(u64, PricingRule)> = state
            .pricing_rules
            .values()
            .filter(|(_, r)| r.property_id == property_id)
            .collect();
        rows.sort_by(|a, b| (b.1.created_at, b.0).cmp(&(a.1.created_at, a.0)));
        Ok(rows.into_iter().map(|(_, r)| r.clone()).collect())
    }
}

#[async_trait]
impl NotificationRepository for MemoryStore {
    async fn create(&self, notification: &AdminNotification) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        let seq = state.next_seq();
        state
            .notifications
            .insert(notification.id, (seq, notification.clone()));
        Ok(())
    }

    async fn list(
        &self,
        limit: Option<usize>,
        unread_only: bool,
    ) -> StoreResult<Vec<AdminNotification>> {
        self.check()?;
        let state = self.state.read().await;
        let mut rows: Vec<&(u64, AdminNotification)> = state
            .notifications
            .values()
            .filter(|(_, n)| !unread_only || !n.read)
            .collect();
        rows.sort_by(|a, b| (b.1.created_at, b.0).cmp(&(a.1.created_at, a.0)));
        Ok(rows
            .into_iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|(_, n)| n.clone())
            .collect())
    }

    async fn mark_read(&self, id: Uuid) -> StoreResult<()> {
        self.check()?;
        let mut state = self.state.write().await;
        let (_, n) = state.notifications.get_mut(&id).ok_or(StoreError::NotFound)?;
        n.read = true;
        Ok(())
    }

    async fn mark_all_read(&self) -> StoreResult<u64> {
        self.check()?;
        let mut state = self.state.write().await;
        let mut flipped = 0;
        for (_, n) in state.notifications.values_mut() {
            if !n.read {
                n.read = true;
                flipped += 1;
            }
        }
        Ok(flipped)
    }

    async fn unread_count(&self) -> StoreResult<u64> {
        self.check()?;
        let state = self.state.read().await;
        Ok(state.notifications.values().filter(|(_, n)| !n.read).count() as u64)
    }
}

#[async_trait]
impl EmailSink for MemoryStore {
    async fn enqueue(&self, email: OutboundEmail) -> StoreResult<Uuid> {
        self.check()?;
        let id = Uuid::new_v4();
        self.state.write().await.outbox.push((id, email));
        Ok(id)
    }
}
