use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    Base,
    Peak,
    Seasonal,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::Base => "base",
            RuleType::Peak => "peak",
            RuleType::Seasonal => "seasonal",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "base" => Some(RuleType::Base),
            "peak" => Some(RuleType::Peak),
            "seasonal" => Some(RuleType::Seasonal),
            _ => None,
        }
    }
}

/// Nightly price override for an inclusive date span.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingRule {
    pub id: Uuid,
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: i64,
    pub rule_type: RuleType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricingRule {
    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
