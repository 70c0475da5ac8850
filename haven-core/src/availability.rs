use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BlockReason {
    Booked,
    Maintenance,
    OwnerUse,
    Manual,
}

impl BlockReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockReason::Booked => "booked",
            BlockReason::Maintenance => "maintenance",
            BlockReason::OwnerUse => "owner_use",
            BlockReason::Manual => "manual",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "booked" => Some(BlockReason::Booked),
            "maintenance" => Some(BlockReason::Maintenance),
            "owner_use" => Some(BlockReason::OwnerUse),
            "manual" => Some(BlockReason::Manual),
            _ => None,
        }
    }
}

/// One blocked night of one property. Free nights have no entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub property_id: String,
    pub date: NaiveDate,
    pub blocked: bool,
    pub booking_id: Option<Uuid>,
    pub reason: Option<BlockReason>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn booked(property_id: &str, date: NaiveDate, booking_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            property_id: property_id.to_string(),
            date,
            blocked: true,
            booking_id: Some(booking_id),
            reason: Some(BlockReason::Booked),
            note: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn manual(
        property_id: &str,
        date: NaiveDate,
        reason: BlockReason,
        note: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            property_id: property_id.to_string(),
            date,
            blocked: true,
            booking_id: None,
            reason: Some(reason),
            note,
            created_at: now,
            updated_at: now,
        }
    }
}
