use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Metadata key linking a provider intent back to exactly one booking.
pub const BOOKING_ID_METADATA_KEY: &str = "booking_id";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Succeeded,
    Canceled,
    Failed,
}

impl IntentStatus {
    /// Still waiting on the guest or the provider.
    pub fn is_open(&self) -> bool {
        !matches!(
            self,
            IntentStatus::Succeeded | IntentStatus::Canceled | IntentStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123)
    pub client_secret: Option<String>,
    pub amount: i64,
    pub currency: String,
    pub status: IntentStatus,
    pub metadata: HashMap<String, String>,
    pub receipt_url: Option<String>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl PaymentIntent {
    pub fn booking_id(&self) -> Option<Uuid> {
        self.metadata
            .get(BOOKING_ID_METADATA_KEY)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    pub id: String,
    pub intent_id: String,
    pub amount: i64,
    pub status: String,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum PaymentProviderError {
    #[error("Payment declined: {reason}")]
    Declined { reason: String },
    #[error("Payment intent not found: {0}")]
    NotFound(String),
    #[error("Payment provider unreachable: {0}")]
    Transport(String),
    #[error("Payment provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        amount: i64,
        currency: &str,
        customer_ref: &str,
        metadata: &HashMap<String, String>,
    ) -> Result<PaymentIntent, PaymentProviderError>;

    /// Retrieve intent status
    async fn retrieve_intent(&self, intent_id: &str) -> Result<PaymentIntent, PaymentProviderError>;

    /// Refund a captured intent, fully when `amount` is None
    async fn refund(
        &self,
        intent_id: &str,
        amount: Option<i64>,
    ) -> Result<Refund, PaymentProviderError>;
}
