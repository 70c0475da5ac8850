use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    BookingCreated,
    BookingCancelled,
    PropertyAdded,
    PaymentReceived,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::BookingCreated => "booking_created",
            NotificationType::BookingCancelled => "booking_cancelled",
            NotificationType::PropertyAdded => "property_added",
            NotificationType::PaymentReceived => "payment_received",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "booking_created" => Some(NotificationType::BookingCreated),
            "booking_cancelled" => Some(NotificationType::BookingCancelled),
            "property_added" => Some(NotificationType::PropertyAdded),
            "payment_received" => Some(NotificationType::PaymentReceived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdminNotification {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub payload: serde_json::Value,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl AdminNotification {
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
        payload: serde_json::Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            notification_type,
            title: title.into(),
            message: message.into(),
            payload,
            read: false,
            created_at: now,
        }
    }
}
