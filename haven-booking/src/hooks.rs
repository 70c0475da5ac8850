use async_trait::async_trait;
use haven_core::mail::EmailSink;
use haven_core::repository::NotificationRepository;
use haven_core::{AdminNotification, Booking, Clock, NotificationType, StoreError};
use haven_shared::models::{BookingCancelledEvent, BookingCreatedEvent, PaymentReceivedEvent};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::templates::EmailTemplates;

/// Something that already committed.
#[derive(Debug, Clone)]
pub enum BookingEvent {
    Created(Booking),
    Cancelled {
        booking: Booking,
        released_nights: u64,
    },
    PaymentReceived {
        booking: Booking,
        intent_id: String,
        amount: i64,
        receipt_url: Option<String>,
    },
}

impl BookingEvent {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingEvent::Created(booking) => booking,
            BookingEvent::Cancelled { booking, .. } => booking,
            BookingEvent::PaymentReceived { booking, .. } => booking,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HookError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Payload encoding failed: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait PostCommitHook: Send + Sync {
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &BookingEvent) -> Result<(), HookError>;
}

/// Runs every hook in its own error boundary. Nothing a hook does reaches the caller.
///
/// Detached hooks run on a spawned task, so `fire` returns as soon as the
/// event is handed off. Inline hooks finish before `fire` returns.
#[derive(Clone)]
pub struct PostCommitHooks {
    hooks: Vec<Arc<dyn PostCommitHook>>,
    timeout: Duration,
    detached: bool,
}

impl Default for PostCommitHooks {
    fn default() -> Self {
        Self {
            hooks: Vec::new(),
            timeout: Duration::from_secs(5),
            detached: false,
        }
    }
}

impl PostCommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn detached(mut self, detached: bool) -> Self {
        self.detached = detached;
        self
    }

    pub fn register(mut self, hook: Arc<dyn PostCommitHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    pub async fn fire(&self, event: &BookingEvent) {
        if self.hooks.is_empty() {
            return;
        }
        if self.detached {
            let hooks = self.clone();
            let event = event.clone();
            tokio::spawn(async move { hooks.run(&event).await });
        } else {
            self.run(event).await;
        }
    }

    async fn run(&self, event: &BookingEvent) {
        let booking_id = event.booking().id;
        for hook in &self.hooks {
            match tokio::time::timeout(self.timeout, hook.on_event(event)).await {
                Ok(Ok(())) => debug!(hook = hook.name(), %booking_id, "Post-commit hook done"),
                Ok(Err(e)) => warn!(hook = hook.name(), %booking_id, error = %e, "Post-commit hook failed"),
                Err(_) => warn!(hook = hook.name(), %booking_id, "Post-commit hook timed out"),
            }
        }
    }
}

/// Writes an admin dashboard notification for each event.
pub struct AdminNotificationHook {
    repo: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl AdminNotificationHook {
    pub fn new(repo: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    fn build(&self, event: &BookingEvent) -> Result<AdminNotification, HookError> {
        let now = self.clock.now();
        let notification = match event {
            BookingEvent::Created(b) => {
                let payload = BookingCreatedEvent {
                    booking_id: b.id,
                    property_id: b.property_id.clone(),
                    guest_name: b.guest.name.clone(),
                    check_in: b.check_in,
                    check_out: b.check_out,
                    nights: b.nights,
                    total: b.pricing.total,
                    currency: b.pricing.currency.clone(),
                    timestamp: now.timestamp(),
                };
                AdminNotification::new(
                    NotificationType::BookingCreated,
                    "New booking",
                    format!(
                        "{} booked {} for {} nights ({} to {})",
                        b.guest.name, b.property_id, b.nights, b.check_in, b.check_out
                    ),
                    serde_json::to_value(payload)?,
                    now,
                )
            }
            BookingEvent::Cancelled { booking: b, released_nights } => {
                let payload = BookingCancelledEvent {
                    booking_id: b.id,
                    property_id: b.property_id.clone(),
                    check_in: b.check_in,
                    check_out: b.check_out,
                    released_nights: *released_nights,
                    timestamp: now.timestamp(),
                };
                AdminNotification::new(
                    NotificationType::BookingCancelled,
                    "Booking cancelled",
                    format!(
                        "Booking {} for {} ({} to {}) was cancelled",
                        b.id, b.property_id, b.check_in, b.check_out
                    ),
                    serde_json::to_value(payload)?,
                    now,
                )
            }
            BookingEvent::PaymentReceived { booking: b, intent_id, amount, receipt_url } => {
                let payload = PaymentReceivedEvent {
                    booking_id: b.id,
                    intent_id: intent_id.clone(),
                    amount: *amount,
                    currency: b.pricing.currency.clone(),
                    receipt_url: receipt_url.clone(),
                    timestamp: now.timestamp(),
                };
                AdminNotification::new(
                    NotificationType::PaymentReceived,
                    "Payment received",
                    format!(
                        "Payment of {} received for booking {}",
                        crate::templates::format_amount(*amount, &b.pricing.currency),
                        b.id
                    ),
                    serde_json::to_value(payload)?,
                    now,
                )
            }
        };
        Ok(notification)
    }
}

#[async_trait]
impl PostCommitHook for AdminNotificationHook {
    fn name(&self) -> &'static str {
        "admin_notification"
    }

    async fn on_event(&self, event: &BookingEvent) -> Result<(), HookError> {
        let notification = self.build(event)?;
        self.repo.create(&notification).await?;
        Ok(())
    }
}

/// Queues guest and admin mail through the outbound sink.
pub struct GuestEmailHook {
    sink: Arc<dyn EmailSink>,
    templates: EmailTemplates,
}

impl GuestEmailHook {
    pub fn new(sink: Arc<dyn EmailSink>, templates: EmailTemplates) -> Self {
        Self { sink, templates }
    }
}

#[async_trait]
impl PostCommitHook for GuestEmailHook {
    fn name(&self) -> &'static str {
        "guest_email"
    }

    async fn on_event(&self, event: &BookingEvent) -> Result<(), HookError> {
        match event {
            BookingEvent::Created(booking) => {
                self.sink.enqueue(self.templates.booking_received(booking)).await?;
                if let Some(alert) = self.templates.new_booking_alert(booking) {
                    self.sink.enqueue(alert).await?;
                }
            }
            BookingEvent::Cancelled { booking, .. } => {
                self.sink.enqueue(self.templates.booking_cancelled(booking)).await?;
            }
            BookingEvent::PaymentReceived { booking, amount, receipt_url, .. } => {
                let email = self
                    .templates
                    .payment_received(booking, *amount, receipt_url.as_deref());
                self.sink.enqueue(email).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{booking_request, d};
    use haven_core::FixedClock;
    use haven_store::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingHook;

    #[async_trait]
    impl PostCommitHook for FailingHook {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn on_event(&self, _event: &BookingEvent) -> Result<(), HookError> {
            Err(HookError::Store(StoreError::Unavailable("smtp down".to_string())))
        }
    }

    struct CountingHook(AtomicUsize);

    #[async_trait]
    impl PostCommitHook for CountingHook {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn on_event(&self, _event: &BookingEvent) -> Result<(), HookError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlowHook;

    #[async_trait]
    impl PostCommitHook for SlowHook {
        fn name(&self) -> &'static str {
            "slow"
        }

        async fn on_event(&self, _event: &BookingEvent) -> Result<(), HookError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn created() -> BookingEvent {
        let request = booking_request("P1", d(2024, 6, 10), d(2024, 6, 13));
        BookingEvent::Created(Booking::from_request(request, 3, chrono::Utc::now()))
    }

    #[tokio::test]
    async fn test_failing_hook_does_not_stop_the_rest() {
        let counter = Arc::new(CountingHook(AtomicUsize::new(0)));
        let hooks = PostCommitHooks::new()
            .with_timeout(Duration::from_millis(50))
            .register(Arc::new(FailingHook))
            .register(Arc::new(SlowHook))
            .register(counter.clone());

        hooks.fire(&created()).await;
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_detached_fire_returns_before_hooks_finish() {
        struct Gate(tokio::sync::Notify, AtomicUsize);

        #[async_trait]
        impl PostCommitHook for Gate {
            fn name(&self) -> &'static str {
                "gate"
            }

            async fn on_event(&self, _event: &BookingEvent) -> Result<(), HookError> {
                self.0.notified().await;
                self.1.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let gate = Arc::new(Gate(tokio::sync::Notify::new(), AtomicUsize::new(0)));
        let hooks = PostCommitHooks::new().detached(true).register(gate.clone());

        tokio::time::timeout(Duration::from_millis(500), hooks.fire(&created()))
            .await
            .expect("detached fire must not wait on its hooks");
        assert_eq!(gate.1.load(Ordering::SeqCst), 0);

        gate.0.notify_one();
        for _ in 0..50 {
            if gate.1.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gate.1.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_admin_notification_payload() {
        let store = Arc::new(MemoryStore::new());
        let hook = AdminNotificationHook::new(
            store.clone(),
            Arc::new(FixedClock::on(d(2024, 6, 1))),
        );
        hook.on_event(&created()).await.unwrap();

        let notifications = store.list(None, true).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].notification_type, NotificationType::BookingCreated);
        assert_eq!(notifications[0].payload["property_id"], "P1");
        assert_eq!(notifications[0].payload["nights"], 3);
    }

    #[tokio::test]
    async fn test_guest_email_hook_queues_guest_and_admin_mail() {
        let store = Arc::new(MemoryStore::new());
        let hook = GuestEmailHook::new(
            store.clone(),
            EmailTemplates::new("Haven", vec!["ops@haven.example".to_string()]),
        );
        hook.on_event(&created()).await.unwrap();

        let outbox = store.outbox().await;
        assert_eq!(outbox.len(), 2);
        assert_eq!(outbox[0].to, vec!["guest@example.com".to_string()]);
        assert_eq!(outbox[1].to, vec!["ops@haven.example".to_string()]);
    }
}
