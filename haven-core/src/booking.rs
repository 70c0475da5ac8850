use chrono::{DateTime, NaiveDate, Utc};
use haven_shared::Masked;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(BookingStatus::Pending),
            "confirmed" => Some(BookingStatus::Confirmed),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, BookingStatus::Completed | BookingStatus::Cancelled)
    }

    /// Pending → Confirmed → Completed, and Pending | Confirmed → Cancelled.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed) | (Confirmed, Completed) | (Pending, Cancelled) | (Confirmed, Cancelled)
        )
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Canceled,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(PaymentStatus::Pending),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            "canceled" => Some(PaymentStatus::Canceled),
            "refunded" => Some(PaymentStatus::Refunded),
            _ => None,
        }
    }

    /// pending → {completed, failed, canceled}; completed → refunded.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        matches!(
            (self, next),
            (Pending, Completed) | (Pending, Failed) | (Pending, Canceled) | (Completed, Refunded)
        )
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who is staying. Contact details are masked in logs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GuestInfo {
    pub user_id: String,
    pub name: String,
    pub email: Masked<String>,
    #[serde(default)]
    pub phone: Option<Masked<String>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestCounts {
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
}

/// All amounts in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceBreakdown {
    pub base: i64,
    pub cleaning_fee: i64,
    pub service_fee: i64,
    pub taxes: i64,
    pub total: i64,
    pub currency: String,
}

impl PriceBreakdown {
    /// None when the sum does not fit in an i64.
    pub fn components_total(&self) -> Option<i64> {
        self.base
            .checked_add(self.cleaning_fee)?
            .checked_add(self.service_fee)?
            .checked_add(self.taxes)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentRecord {
    pub status: PaymentStatus,
    pub method: Option<String>,
    pub intent_id: Option<String>,
    pub amount: Option<i64>,
    pub receipt_url: Option<String>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl PaymentRecord {
    pub fn pending(method: Option<String>) -> Self {
        Self {
            status: PaymentStatus::Pending,
            method,
            intent_id: None,
            amount: None,
            receipt_url: None,
            processed_at: None,
        }
    }

    /// Merge provider fields; unset fields keep their current value.
    pub fn merge(&mut self, update: &PaymentUpdate, now: DateTime<Utc>) {
        self.status = update.status;
        if let Some(intent_id) = &update.intent_id {
            self.intent_id = Some(intent_id.clone());
        }
        if let Some(amount) = update.amount {
            self.amount = Some(amount);
        }
        if let Some(receipt_url) = &update.receipt_url {
            self.receipt_url = Some(receipt_url.clone());
        }
        self.processed_at = Some(now);
    }
}

/// Payment fields written by the payment coordinator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaymentUpdate {
    pub status: PaymentStatus,
    pub intent_id: Option<String>,
    pub amount: Option<i64>,
    pub receipt_url: Option<String>,
}

/// What a guest submits. Id, status and timestamps are assigned by the coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub property_id: String,
    pub guest: GuestInfo,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub guests: GuestCounts,
    pub pricing: PriceBreakdown,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub property_id: String,
    pub guest: GuestInfo,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub nights: u32,
    pub guests: GuestCounts,
    pub pricing: PriceBreakdown,
    pub status: BookingStatus,
    pub payment: PaymentRecord,
    pub special_requests: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn from_request(request: BookingRequest, nights: u32, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            property_id: request.property_id,
            guest: request.guest,
            check_in: request.check_in,
            check_out: request.check_out,
            nights,
            guests: request.guests,
            pricing: request.pricing,
            status: BookingStatus::Pending,
            payment: PaymentRecord::pending(request.payment_method),
            special_requests: request.special_requests,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, status: BookingStatus, now: DateTime<Utc>) {
        self.status = status;
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_status_transitions() {
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Confirmed));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Completed));
        assert!(BookingStatus::Pending.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Confirmed.can_transition_to(BookingStatus::Cancelled));

        assert!(!BookingStatus::Pending.can_transition_to(BookingStatus::Completed));
        assert!(!BookingStatus::Cancelled.can_transition_to(BookingStatus::Pending));
        assert!(!BookingStatus::Completed.can_transition_to(BookingStatus::Cancelled));
        assert!(BookingStatus::Completed.is_terminal());
    }

    #[test]
    fn test_payment_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Completed));
        assert!(PaymentStatus::Completed.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Completed));
        assert!(!PaymentStatus::Failed.can_transition_to(PaymentStatus::Completed));
        assert_eq!(PaymentStatus::parse("canceled"), Some(PaymentStatus::Canceled));
    }

    #[test]
    fn test_guest_debug_masks_contact() {
        let guest = GuestInfo {
            user_id: "u1".to_string(),
            name: "Ada".to_string(),
            email: "ada@example.com".into(),
            phone: Some("+44 20 7946 0000".into()),
        };
        let printed = format!("{:?}", guest);
        assert!(!printed.contains("ada@example.com"));
        assert!(!printed.contains("7946"));
        assert!(printed.contains("Ada"));
    }

    #[test]
    fn test_payment_merge_keeps_unset_fields() {
        let mut record = PaymentRecord::pending(Some("card".to_string()));
        let now = Utc::now();
        record.merge(
            &PaymentUpdate {
                status: PaymentStatus::Pending,
                intent_id: Some("pi_1".to_string()),
                amount: Some(1000),
                receipt_url: None,
            },
            now,
        );
        record.merge(
            &PaymentUpdate {
                status: PaymentStatus::Completed,
                intent_id: None,
                amount: None,
                receipt_url: Some("https://receipts/1".to_string()),
            },
            now,
        );
        assert_eq!(record.status, PaymentStatus::Completed);
        assert_eq!(record.intent_id.as_deref(), Some("pi_1"));
        assert_eq!(record.amount, Some(1000));
        assert_eq!(record.processed_at, Some(now));
    }
}
