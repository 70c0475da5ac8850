use chrono::NaiveDate;
use haven_core::dates::MAX_LOOKUP_DAYS;
use haven_core::repository::AvailabilityRepository;
use haven_core::{BlockReason, BookingError, BookingResult, Clock, LedgerEntry};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Admin calendar operations. Manual blocks skip conflict checks on purpose:
/// whatever the admin writes last is what the calendar shows.
pub struct AvailabilityService {
    repo: Arc<dyn AvailabilityRepository>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(repo: Arc<dyn AvailabilityRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn block_dates_manually(
        &self,
        property_id: &str,
        dates: &[NaiveDate],
        reason: BlockReason,
        note: Option<String>,
    ) -> BookingResult<usize> {
        if dates.is_empty() {
            return Err(BookingError::Validation("No dates selected".to_string()));
        }
        if reason == BlockReason::Booked {
            return Err(BookingError::Validation(
                "The booked reason is reserved for guest bookings".to_string(),
            ));
        }

        let now = self.clock.now();
        let entries: Vec<LedgerEntry> = dates
            .iter()
            .map(|date| LedgerEntry::manual(property_id, *date, reason, note.clone(), now))
            .collect();
        self.repo
            .manual_block(&entries)
            .await
            .map_err(|e| BookingError::from_store(e, property_id))?;

        info!(property_id, count = entries.len(), reason = reason.as_str(), "Dates blocked manually");
        Ok(entries.len())
    }

    pub async fn unblock_dates_manually(&self, property_id: &str, dates: &[NaiveDate]) -> BookingResult<u64> {
        if dates.is_empty() {
            return Err(BookingError::Validation("No dates selected".to_string()));
        }
        let removed = self
            .repo
            .manual_unblock(property_id, dates)
            .await
            .map_err(|e| BookingError::from_store(e, property_id))?;
        info!(property_id, removed, "Dates unblocked manually");
        Ok(removed)
    }

    /// Blocked nights between `start` and `end`, both inclusive.
    pub async fn get_availability_calendar(
        &self,
        property_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> BookingResult<BTreeMap<NaiveDate, LedgerEntry>> {
        if start > end {
            return Err(BookingError::InvalidDateRange(
                "calendar start must not be after its end".to_string(),
            ));
        }
        if (end - start).num_days() > MAX_LOOKUP_DAYS {
            return Err(BookingError::InvalidDateRange(format!(
                "calendar spans at most {} days",
                MAX_LOOKUP_DAYS
            )));
        }
        self.repo
            .calendar(property_id, start, end)
            .await
            .map_err(|e| BookingError::from_store(e, property_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::d;
    use haven_core::FixedClock;
    use haven_store::memory::MemoryStore;

    fn service(store: &MemoryStore) -> AvailabilityService {
        AvailabilityService::new(Arc::new(store.clone()), Arc::new(FixedClock::on(d(2024, 5, 1))))
    }

    #[tokio::test]
    async fn test_block_unblock_calendar() {
        let store = MemoryStore::new();
        let service = service(&store);

        let dates = [d(2024, 7, 1), d(2024, 7, 2)];
        assert_eq!(
            service
                .block_dates_manually("P1", &dates, BlockReason::Maintenance, Some("pool repair".into()))
                .await
                .unwrap(),
            2
        );

        let calendar = service.get_availability_calendar("P1", d(2024, 7, 1), d(2024, 7, 31)).await.unwrap();
        assert_eq!(calendar.len(), 2);
        assert_eq!(calendar[&d(2024, 7, 1)].reason, Some(BlockReason::Maintenance));
        assert_eq!(calendar[&d(2024, 7, 1)].note.as_deref(), Some("pool repair"));

        // Last write wins
        service
            .block_dates_manually("P1", &dates[..1], BlockReason::OwnerUse, None)
            .await
            .unwrap();
        let calendar = service.get_availability_calendar("P1", d(2024, 7, 1), d(2024, 7, 1)).await.unwrap();
        assert_eq!(calendar[&d(2024, 7, 1)].reason, Some(BlockReason::OwnerUse));

        assert_eq!(service.unblock_dates_manually("P1", &dates).await.unwrap(), 2);
        assert!(store.is_range_free("P1", d(2024, 7, 1), d(2024, 7, 3)).await.unwrap());
    }

    #[tokio::test]
    async fn test_rejects_bad_input() {
        let store = MemoryStore::new();
        let service = service(&store);

        assert!(matches!(
            service.block_dates_manually("P1", &[], BlockReason::Manual, None).await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            service
                .block_dates_manually("P1", &[d(2024, 7, 1)], BlockReason::Booked, None)
                .await,
            Err(BookingError::Validation(_))
        ));
        assert!(matches!(
            service.get_availability_calendar("P1", d(2024, 7, 2), d(2024, 7, 1)).await,
            Err(BookingError::InvalidDateRange(_))
        ));
    }

    #[tokio::test]
    async fn test_calendar_span_is_capped() {
        let store = MemoryStore::new();
        let service = service(&store);

        // A full leap year is fine
        assert!(service
            .get_availability_calendar("P1", d(2024, 1, 1), d(2024, 12, 31))
            .await
            .is_ok());
        assert!(matches!(
            service.get_availability_calendar("P1", d(2024, 1, 1), d(2026, 1, 1)).await,
            Err(BookingError::InvalidDateRange(_))
        ));
        let first = NaiveDate::from_ymd_opt(1, 1, 1).unwrap();
        let last = NaiveDate::from_ymd_opt(9999, 12, 31).unwrap();
        assert!(matches!(
            service.get_availability_calendar("P1", first, last).await,
            Err(BookingError::InvalidDateRange(_))
        ));
    }
}
