use async_trait::async_trait;
use haven_core::payment::{
    IntentStatus, PaymentAdapter, PaymentIntent, PaymentProviderError, Refund, BOOKING_ID_METADATA_KEY,
};
use haven_core::repository::BookingRepository;
use haven_core::{
    Booking, BookingError, BookingResult, BookingStatus, Clock, PaymentStatus, PaymentUpdate,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use crate::coordinator::BookingCoordinator;
use crate::hooks::{BookingEvent, PostCommitHooks};

/// Outcome of `confirm_payment`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentConfirmation {
    pub status: IntentStatus,
    pub booking_id: Uuid,
    pub amount: i64,
    pub receipt_url: Option<String>,
}

/// Drives the provider's intent lifecycle and mirrors it onto bookings.
pub struct PaymentCoordinator {
    adapter: Arc<dyn PaymentAdapter>,
    bookings: Arc<dyn BookingRepository>,
    coordinator: Arc<BookingCoordinator>,
    hooks: PostCommitHooks,
    clock: Arc<dyn Clock>,
}

impl PaymentCoordinator {
    pub fn new(
        adapter: Arc<dyn PaymentAdapter>,
        bookings: Arc<dyn BookingRepository>,
        coordinator: Arc<BookingCoordinator>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            adapter,
            bookings,
            coordinator,
            hooks: PostCommitHooks::new(),
            clock,
        }
    }

    pub fn with_hooks(mut self, hooks: PostCommitHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Start paying for a pending booking. An intent that is still open is reused.
    pub async fn create_payment_intent(&self, booking_id: Uuid) -> BookingResult<PaymentIntent> {
        let booking = self.coordinator.get_booking(booking_id).await?;
        if booking.status != BookingStatus::Pending {
            return Err(BookingError::Validation(format!(
                "Only pending bookings can be paid, this one is {}",
                booking.status
            )));
        }

        if let (PaymentStatus::Pending, Some(intent_id)) = (booking.payment.status, &booking.payment.intent_id) {
            let existing = self.adapter.retrieve_intent(intent_id).await?;
            if existing.status.is_open() {
                info!(%booking_id, intent_id = %existing.id, "Reusing open payment intent");
                return Ok(existing);
            }
        }

        let mut metadata = HashMap::new();
        metadata.insert(BOOKING_ID_METADATA_KEY.to_string(), booking.id.to_string());
        metadata.insert("property_id".to_string(), booking.property_id.clone());

        let intent = self
            .adapter
            .create_intent(
                booking.pricing.total,
                &booking.pricing.currency,
                booking.guest.email.expose(),
                &metadata,
            )
            .await?;

        self.write_payment(
            booking_id,
            PaymentUpdate {
                status: PaymentStatus::Pending,
                intent_id: Some(intent.id.clone()),
                amount: Some(intent.amount),
                receipt_url: None,
            },
        )
        .await?;

        info!(%booking_id, intent_id = %intent.id, amount = intent.amount, "Payment intent created");
        Ok(intent)
    }

    /// Booking an intent was created for, as recorded in the provider's metadata.
    pub async fn booking_for_intent(&self, intent_id: &str) -> BookingResult<Uuid> {
        let intent = self.adapter.retrieve_intent(intent_id).await?;
        linked_booking(&intent)
    }

    /// Re-reads the intent from the provider and applies its outcome to the booking.
    /// Safe to call repeatedly for the same intent.
    pub async fn confirm_payment(&self, intent_id: &str) -> BookingResult<PaymentConfirmation> {
        // 1. Provider is the source of truth
        let intent = self.adapter.retrieve_intent(intent_id).await?;
        let booking_id = linked_booking(&intent)?;
        let booking = self.coordinator.get_booking(booking_id).await?;

        // 2. An intent replaced by a newer one no longer speaks for the booking
        let superseded = booking
            .payment
            .intent_id
            .as_deref()
            .is_some_and(|active| active != intent.id);

        // 3. Mirror the outcome
        match intent.status {
            IntentStatus::Succeeded if superseded => {
                warn!(
                    %booking_id,
                    intent_id,
                    active_intent = ?booking.payment.intent_id,
                    amount = intent.amount,
                    "Superseded payment intent succeeded, needs a refund"
                );
                return Err(BookingError::Validation(format!(
                    "Payment intent {} is no longer the active intent for this booking",
                    intent.id
                )));
            }
            IntentStatus::Failed | IntentStatus::Canceled if superseded => {
                info!(%booking_id, intent_id, status = ?intent.status, "Ignoring outcome of a superseded payment intent");
            }
            IntentStatus::Succeeded => self.apply_success(&booking, &intent).await?,
            IntentStatus::Failed | IntentStatus::Canceled => self.apply_failure(&booking, &intent).await?,
            _ => {
                info!(%booking_id, intent_id, status = ?intent.status, "Payment still in progress");
            }
        }

        Ok(PaymentConfirmation {
            status: intent.status,
            booking_id,
            amount: intent.amount,
            receipt_url: intent.receipt_url,
        })
    }

    /// Records the payment, then confirms the booking. A retry after the
    /// payment write landed but the status change did not finishes the job.
    async fn apply_success(&self, booking: &Booking, intent: &PaymentIntent) -> BookingResult<()> {
        match booking.payment.status {
            PaymentStatus::Refunded => return Ok(()),
            PaymentStatus::Completed if booking.status != BookingStatus::Pending => return Ok(()),
            _ => {}
        }
        if booking.status.is_terminal() {
            warn!(booking_id = %booking.id, intent_id = %intent.id, "Payment succeeded for a closed booking");
            return Err(BookingError::InvalidTransition {
                from: booking.status.to_string(),
                to: BookingStatus::Confirmed.to_string(),
            });
        }

        if booking.payment.status != PaymentStatus::Completed {
            if !booking.payment.status.can_transition_to(PaymentStatus::Completed) {
                return Err(BookingError::InvalidTransition {
                    from: format!("payment {}", booking.payment.status),
                    to: format!("payment {}", PaymentStatus::Completed),
                });
            }
            self.write_payment(
                booking.id,
                PaymentUpdate {
                    status: PaymentStatus::Completed,
                    intent_id: Some(intent.id.clone()),
                    amount: Some(intent.amount),
                    receipt_url: intent.receipt_url.clone(),
                },
            )
            .await?;
        }
        let confirmed = self
            .coordinator
            .update_booking_status(booking.id, BookingStatus::Confirmed)
            .await?;

        info!(booking_id = %booking.id, intent_id = %intent.id, amount = intent.amount, "Payment confirmed");
        self.hooks
            .fire(&BookingEvent::PaymentReceived {
                booking: confirmed,
                intent_id: intent.id.clone(),
                amount: intent.amount,
                receipt_url: intent.receipt_url.clone(),
            })
            .await;
        Ok(())
    }

    async fn apply_failure(&self, booking: &Booking, intent: &PaymentIntent) -> BookingResult<()> {
        let target = if intent.status == IntentStatus::Failed {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Canceled
        };

        if booking.payment.status.can_transition_to(target) {
            self.write_payment(
                booking.id,
                PaymentUpdate {
                    status: target,
                    intent_id: Some(intent.id.clone()),
                    amount: None,
                    receipt_url: None,
                },
            )
            .await?;
        }

        if booking.status == BookingStatus::Pending {
            warn!(
                booking_id = %booking.id,
                intent_id = %intent.id,
                reason = intent.failure_reason.as_deref().unwrap_or("unknown"),
                "Payment did not go through, cancelling booking"
            );
            self.coordinator.cancel_booking(booking.id).await?;
        }
        Ok(())
    }

    /// Refund a completed payment, fully when `amount` is None.
    pub async fn refund_payment(&self, booking_id: Uuid, amount: Option<i64>) -> BookingResult<Refund> {
        let booking = self.coordinator.get_booking(booking_id).await?;
        if booking.payment.status != PaymentStatus::Completed {
            return Err(BookingError::InvalidTransition {
                from: format!("payment {}", booking.payment.status),
                to: format!("payment {}", PaymentStatus::Refunded),
            });
        }
        let intent_id = booking
            .payment
            .intent_id
            .clone()
            .ok_or_else(|| BookingError::Validation("Booking has no payment intent".to_string()))?;

        let paid = booking.payment.amount.unwrap_or(booking.pricing.total);
        if let Some(requested) = amount {
            if requested <= 0 || requested > paid {
                return Err(BookingError::Validation(format!(
                    "Refund amount must be between 1 and {}",
                    paid
                )));
            }
        }

        let refund = self.adapter.refund(&intent_id, amount).await?;
        self.write_payment(
            booking_id,
            PaymentUpdate {
                status: PaymentStatus::Refunded,
                intent_id: None,
                amount: None,
                receipt_url: None,
            },
        )
        .await?;

        info!(%booking_id, refund_id = %refund.id, amount = refund.amount, "Payment refunded");
        Ok(refund)
    }

    async fn write_payment(&self, booking_id: Uuid, update: PaymentUpdate) -> BookingResult<()> {
        self.bookings
            .update_payment(booking_id, &update, self.clock.now())
            .await
            .map_err(|e| BookingError::from_store(e, booking_id.to_string()))
    }
}

fn linked_booking(intent: &PaymentIntent) -> BookingResult<Uuid> {
    intent
        .booking_id()
        .ok_or_else(|| BookingError::Validation("Payment intent is not linked to a booking".to_string()))
}

/// In-process provider for tests and local runs. Intents stay where
/// `set_status` puts them.
#[derive(Default)]
pub struct MockPaymentAdapter {
    intents: Mutex<HashMap<String, PaymentIntent>>,
    next_id: AtomicU64,
    offline: AtomicBool,
}

impl MockPaymentAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every call fails like an unreachable provider.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn set_status(&self, intent_id: &str, status: IntentStatus) -> Result<(), PaymentProviderError> {
        let mut intents = self.intents.lock().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| PaymentProviderError::NotFound(intent_id.to_string()))?;
        intent.status = status;
        match status {
            IntentStatus::Succeeded => {
                intent.receipt_url = Some(format!("https://payments.mock/receipts/{}", intent_id));
            }
            IntentStatus::Failed => {
                intent.failure_reason = Some("card_declined".to_string());
            }
            _ => {}
        }
        Ok(())
    }

    pub async fn intent_count(&self) -> usize {
        self.intents.lock().await.len()
    }

    fn check(&self) -> Result<(), PaymentProviderError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PaymentProviderError::Transport("mock provider offline".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        _customer_ref: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentProviderError> {
        self.check()?;
        let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let id = format!("mock_pi_{}", n);
        let intent = PaymentIntent {
            id: id.clone(),
            client_secret: Some(format!("{}_secret", id)),
            amount,
            currency: currency.to_string(),
            status: IntentStatus::RequiresPaymentMethod,
            metadata: metadata.clone(),
            receipt_url: None,
            failure_reason: None,
            created_at: chrono::Utc::now(),
        };
        self.intents.lock().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentProviderError> {
        self.check()?;
        self.intents
            .lock()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| PaymentProviderError::NotFound(intent_id.to_string()))
    }

    async fn refund(&self, intent_id: &str, amount: Option<i64>) -> Result<Refund, PaymentProviderError> {
        self.check()?;
        let intents = self.intents.lock().await;
        let intent = intents
            .get(intent_id)
            .ok_or_else(|| PaymentProviderError::NotFound(intent_id.to_string()))?;
        if intent.status != IntentStatus::Succeeded {
            return Err(PaymentProviderError::Provider(format!(
                "intent {} has not succeeded",
                intent_id
            )));
        }
        Ok(Refund {
            id: format!("mock_re_{}", intent_id),
            intent_id: intent_id.to_string(),
            amount: amount.unwrap_or(intent.amount),
            status: "succeeded".to_string(),
        })
    }
}
