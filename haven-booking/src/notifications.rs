use haven_core::repository::NotificationRepository;
use haven_core::{AdminNotification, BookingError, BookingResult, Clock, NotificationType};
use std::sync::Arc;
use uuid::Uuid;

/// Admin dashboard notifications.
pub struct NotificationService {
    repo: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationService {
    pub fn new(repo: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    pub async fn notify(
        &self,
        notification_type: NotificationType,
        title: &str,
        message: &str,
        payload: serde_json::Value,
    ) -> BookingResult<AdminNotification> {
        if title.trim().is_empty() {
            return Err(BookingError::Validation("Notification title is required".to_string()));
        }
        let notification = AdminNotification::new(notification_type, title, message, payload, self.clock.now());
        self.repo
            .create(&notification)
            .await
            .map_err(|e| BookingError::from_store(e, notification.id.to_string()))?;
        Ok(notification)
    }

    pub async fn list(&self, limit: Option<usize>, unread_only: bool) -> BookingResult<Vec<AdminNotification>> {
        self.repo
            .list(limit, unread_only)
            .await
            .map_err(|e| BookingError::from_store(e, "notifications"))
    }

    pub async fn unread_count(&self) -> BookingResult<u64> {
        self.repo
            .unread_count()
            .await
            .map_err(|e| BookingError::from_store(e, "notifications"))
    }

    pub async fn mark_read(&self, id: Uuid) -> BookingResult<()> {
        self.repo
            .mark_read(id)
            .await
            .map_err(|e| BookingError::from_store(e, id.to_string()))
    }

    pub async fn mark_all_read(&self) -> BookingResult<u64> {
        self.repo
            .mark_all_read()
            .await
            .map_err(|e| BookingError::from_store(e, "notifications"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use haven_core::FixedClock;
    use haven_store::memory::MemoryStore;
    use serde_json::json;

    #[tokio::test]
    async fn test_list_filter_and_read_flags() {
        let store = Arc::new(MemoryStore::new());
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();

        for (i, kind) in [NotificationType::PropertyAdded, NotificationType::BookingCreated, NotificationType::PaymentReceived]
            .into_iter()
            .enumerate()
        {
            let service = NotificationService::new(
                store.clone(),
                Arc::new(FixedClock(start + Duration::minutes(i as i64))),
            );
            service.notify(kind, "title", "message", json!({ "i": i })).await.unwrap();
        }

        let service = NotificationService::new(store.clone(), Arc::new(FixedClock(start)));
        let all = service.list(None, false).await.unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].notification_type, NotificationType::PaymentReceived);

        let latest_two = service.list(Some(2), false).await.unwrap();
        assert_eq!(latest_two.len(), 2);

        service.mark_read(all[0].id).await.unwrap();
        assert_eq!(service.unread_count().await.unwrap(), 2);
        assert_eq!(service.list(None, true).await.unwrap().len(), 2);

        assert_eq!(service.mark_all_read().await.unwrap(), 2);
        assert_eq!(service.unread_count().await.unwrap(), 0);

        assert!(matches!(
            service.mark_read(Uuid::new_v4()).await,
            Err(BookingError::NotFound(_))
        ));
    }
}
