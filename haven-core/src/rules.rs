use serde::Deserialize;

/// Limits the booking coordinator enforces.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BookingRules {
    pub min_nights: u32,
    pub max_nights: u32,
    pub max_transaction_attempts: u32,
    pub retry_backoff_ms: u64,
    pub transaction_timeout_ms: u64,
}

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            min_nights: 1,
            max_nights: 30,
            max_transaction_attempts: 5,
            retry_backoff_ms: 20,
            transaction_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PricingPolicy {
    pub currency: String,
    /// Fraction of the nightly base, e.g. 0.12
    pub service_fee_rate: f64,
    /// Applied to base + cleaning + service fee
    pub tax_rate: f64,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            currency: "EUR".to_string(),
            service_fee_rate: 0.12,
            tax_rate: 0.10,
        }
    }
}
