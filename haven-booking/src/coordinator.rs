use chrono::NaiveDate;
use haven_core::dates::{dates_in_range, nights, MAX_LOOKUP_DAYS};
use haven_core::repository::{AvailabilityRepository, BookingRepository, TransactionalStore};
use haven_core::{
    Booking, BookingError, BookingRequest, BookingResult, BookingRules, BookingStatus, Clock,
    LedgerEntry, StoreError,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::hooks::{BookingEvent, PostCommitHooks};

/// Why one transaction attempt did not commit.
enum AttemptError {
    Taken(Vec<NaiveDate>),
    Store(StoreError),
}

impl From<StoreError> for AttemptError {
    fn from(err: StoreError) -> Self {
        AttemptError::Store(err)
    }
}

/// Creates bookings so that no (property, night) is ever sold twice,
/// and drives the booking status lifecycle.
pub struct BookingCoordinator {
    store: Arc<dyn TransactionalStore>,
    bookings: Arc<dyn BookingRepository>,
    availability: Arc<dyn AvailabilityRepository>,
    hooks: PostCommitHooks,
    clock: Arc<dyn Clock>,
    rules: BookingRules,
}

impl BookingCoordinator {
    pub fn new(
        store: Arc<dyn TransactionalStore>,
        bookings: Arc<dyn BookingRepository>,
        availability: Arc<dyn AvailabilityRepository>,
        clock: Arc<dyn Clock>,
        rules: BookingRules,
    ) -> Self {
        Self {
            store,
            bookings,
            availability,
            hooks: PostCommitHooks::new(),
            clock,
            rules,
        }
    }

    pub fn with_hooks(mut self, hooks: PostCommitHooks) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn rules(&self) -> &BookingRules {
        &self.rules
    }

    /// Checks a request without touching the store and returns its night count.
    pub fn validate(&self, request: &BookingRequest) -> BookingResult<u32> {
        if request.check_in >= request.check_out {
            return Err(BookingError::InvalidDateRange(
                "check-out must be after check-in".to_string(),
            ));
        }

        let stay = nights(request.check_in, request.check_out);
        if stay < self.rules.min_nights as i64 || stay > self.rules.max_nights as i64 {
            return Err(BookingError::InvalidDateRange(format!(
                "stay of {} nights is outside {}..={} nights",
                stay, self.rules.min_nights, self.rules.max_nights
            )));
        }

        if request.check_in < self.clock.today() {
            return Err(BookingError::InvalidDateRange(
                "check-in date is in the past".to_string(),
            ));
        }

        if request.property_id.trim().is_empty() {
            return Err(BookingError::Validation("A property is required".to_string()));
        }
        if request.guests.adults < 1 {
            return Err(BookingError::Validation(
                "At least one adult guest is required".to_string(),
            ));
        }
        if request.guest.name.trim().is_empty() {
            return Err(BookingError::Validation("Guest name is required".to_string()));
        }
        if !request.guest.email.expose().contains('@') {
            return Err(BookingError::Validation(
                "A valid guest email is required".to_string(),
            ));
        }

        let p = &request.pricing;
        if [p.base, p.cleaning_fee, p.service_fee, p.taxes, p.total]
            .iter()
            .any(|amount| *amount < 0)
        {
            return Err(BookingError::Validation(
                "Price components must not be negative".to_string(),
            ));
        }
        if p.currency.len() != 3 || !p.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(BookingError::Validation(
                "Currency must be a 3-letter code".to_string(),
            ));
        }
        match p.components_total() {
            Some(sum) if sum == p.total => {}
            Some(_) => {
                return Err(BookingError::Validation(
                    "Price total does not match its components".to_string(),
                ))
            }
            None => {
                return Err(BookingError::Validation(
                    "Price components are too large".to_string(),
                ))
            }
        }

        Ok(stay as u32)
    }

    /// Create a booking and block every night of it in one transaction.
    pub async fn create_booking(&self, request: BookingRequest) -> BookingResult<Booking> {
        // 1. Validate before any store round-trip
        let stay = self.validate(&request)?;

        let dates = dates_in_range(request.check_in, request.check_out);
        let booking = Booking::from_request(request, stay, self.clock.now());
        let entries: Vec<LedgerEntry> = dates
            .iter()
            .map(|date| LedgerEntry::booked(&booking.property_id, *date, booking.id, booking.created_at))
            .collect();

        // 2. Check-and-reserve, retried on write conflicts
        let timeout = Duration::from_millis(self.rules.transaction_timeout_ms);
        let max_attempts = self.rules.max_transaction_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(timeout, self.reserve(&booking, &dates, &entries)).await;

            match outcome {
                Ok(Ok(())) => break,
                Ok(Err(AttemptError::Taken(taken))) => {
                    info!(property_id = %booking.property_id, nights = ?taken, "Requested nights already blocked");
                    return Err(BookingError::DatesUnavailable {
                        property_id: booking.property_id.clone(),
                        dates: taken,
                    });
                }
                Ok(Err(AttemptError::Store(StoreError::Conflict))) if attempt < max_attempts => {
                    let backoff = self.rules.retry_backoff_ms.saturating_mul(1 << (attempt - 1).min(16));
                    debug!(property_id = %booking.property_id, attempt, backoff_ms = backoff, "Transaction conflict, retrying");
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                }
                Ok(Err(AttemptError::Store(StoreError::Conflict))) => {
                    warn!(property_id = %booking.property_id, attempts = attempt, "Gave up after repeated conflicts");
                    return Err(BookingError::DatesUnavailable {
                        property_id: booking.property_id.clone(),
                        dates,
                    });
                }
                Ok(Err(AttemptError::Store(e))) => {
                    warn!(property_id = %booking.property_id, error = %e, "Booking transaction failed");
                    return Err(BookingError::StoreUnavailable(e.to_string()));
                }
                Err(_) => {
                    warn!(property_id = %booking.property_id, "Booking transaction timed out");
                    return Err(BookingError::StoreUnavailable(
                        "booking transaction timed out".to_string(),
                    ));
                }
            }
        }

        info!(
            booking_id = %booking.id,
            property_id = %booking.property_id,
            check_in = %booking.check_in,
            check_out = %booking.check_out,
            "Booking created"
        );

        // 3. Best-effort side effects
        self.hooks.fire(&BookingEvent::Created(booking.clone())).await;

        Ok(booking)
    }

    async fn reserve(
        &self,
        booking: &Booking,
        dates: &[NaiveDate],
        entries: &[LedgerEntry],
    ) -> Result<(), AttemptError> {
        let mut tx = self.store.begin().await?;

        let taken = tx.blocked_dates(&booking.property_id, dates).await?;
        if !taken.is_empty() {
            if let Err(e) = tx.rollback().await {
                debug!(error = %e, "Rollback after conflict check failed");
            }
            return Err(AttemptError::Taken(taken));
        }

        tx.insert_booking(booking).await?;
        tx.insert_ledger_entries(entries).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Advisory check; `create_booking` re-checks inside its transaction.
    pub async fn check_availability(
        &self,
        property_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
    ) -> BookingResult<bool> {
        if check_in >= check_out {
            return Err(BookingError::InvalidDateRange(
                "check-out must be after check-in".to_string(),
            ));
        }
        if nights(check_in, check_out) > MAX_LOOKUP_DAYS {
            return Err(BookingError::InvalidDateRange(format!(
                "availability spans at most {} nights",
                MAX_LOOKUP_DAYS
            )));
        }
        self.availability
            .is_range_free(property_id, check_in, check_out)
            .await
            .map_err(|e| BookingError::from_store(e, property_id))
    }

    /// Sets the booking to cancelled, then releases its nights.
    ///
    /// The two writes are not atomic. Cancelling an already cancelled booking
    /// only repeats the release, which lets an operator finish a half-done cancel.
    pub async fn cancel_booking(&self, id: Uuid) -> BookingResult<Booking> {
        let mut booking = self.get_booking(id).await?;

        match booking.status {
            BookingStatus::Cancelled => {
                let released = self.release_nights(id).await?;
                if released > 0 {
                    warn!(booking_id = %id, released, "Released nights left behind by an earlier cancel");
                }
                return Ok(booking);
            }
            BookingStatus::Completed => {
                return Err(BookingError::InvalidTransition {
                    from: booking.status.to_string(),
                    to: BookingStatus::Cancelled.to_string(),
                });
            }
            BookingStatus::Pending | BookingStatus::Confirmed => {}
        }

        let now = self.clock.now();
        self.bookings
            .update_status(id, BookingStatus::Cancelled, now)
            .await
            .map_err(|e| BookingError::from_store(e, id.to_string()))?;
        booking.update_status(BookingStatus::Cancelled, now);

        let released = self.release_nights(id).await?;
        info!(booking_id = %id, released, "Booking cancelled");

        self.hooks
            .fire(&BookingEvent::Cancelled {
                booking: booking.clone(),
                released_nights: released,
            })
            .await;

        Ok(booking)
    }

    async fn release_nights(&self, id: Uuid) -> BookingResult<u64> {
        self.availability.unblock_for_booking(id).await.map_err(|e| {
            warn!(booking_id = %id, error = %e, "Failed to release booked nights");
            BookingError::from_store(e, id.to_string())
        })
    }

    /// Direct status change. Cancelling goes through `cancel_booking`;
    /// setting the current status again is a no-op.
    pub async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> BookingResult<Booking> {
        if status == BookingStatus::Cancelled {
            return self.cancel_booking(id).await;
        }

        let mut booking = self.get_booking(id).await?;
        if booking.status == status {
            return Ok(booking);
        }
        if !booking.status.can_transition_to(status) {
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: status.to_string(),
            });
        }

        let now = self.clock.now();
        self.bookings
            .update_status(id, status, now)
            .await
            .map_err(|e| BookingError::from_store(e, id.to_string()))?;
        booking.update_status(status, now);
        info!(booking_id = %id, status = %status, "Booking status updated");
        Ok(booking)
    }

    /// Admin hard delete. Returns how many nights were released.
    pub async fn delete_booking(&self, id: Uuid) -> BookingResult<u64> {
        self.bookings
            .delete(id)
            .await
            .map_err(|e| BookingError::from_store(e, id.to_string()))?;
        let released = self.release_nights(id).await?;
        info!(booking_id = %id, released, "Booking deleted");
        Ok(released)
    }

    pub async fn get_booking(&self, id: Uuid) -> BookingResult<Booking> {
        self.bookings
            .get(id)
            .await
            .map_err(|e| BookingError::from_store(e, id.to_string()))?
            .ok_or_else(|| BookingError::NotFound(id.to_string()))
    }

    pub async fn list_for_user(&self, user_id: &str) -> BookingResult<Vec<Booking>> {
        self.bookings
            .list_by_user(user_id)
            .await
            .map_err(|e| BookingError::from_store(e, user_id))
    }

    pub async fn list_for_property(&self, property_id: &str) -> BookingResult<Vec<Booking>> {
        self.bookings
            .list_by_property(property_id)
            .await
            .map_err(|e| BookingError::from_store(e, property_id))
    }

    pub async fn list_all(&self) -> BookingResult<Vec<Booking>> {
        self.bookings
            .list_all()
            .await
            .map_err(|e| BookingError::from_store(e, "bookings"))
    }

    pub async fn list_by_status(&self, status: BookingStatus) -> BookingResult<Vec<Booking>> {
        self.bookings
            .list_by_status(status)
            .await
            .map_err(|e| BookingError::from_store(e, status.as_str()))
    }
}
