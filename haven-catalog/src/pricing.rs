use chrono::NaiveDate;
use haven_core::dates::{dates_in_range, nights};
use haven_core::{BookingRules, PriceBreakdown, PricingPolicy, PricingRule, StoreError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Invalid pricing input: {0}")]
    Invalid(String),
    #[error("Pricing rule not found: {0}")]
    NotFound(Uuid),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Price charged for one night and the rule that set it, if any.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NightlyRate {
    pub date: NaiveDate,
    pub price: i64,
    pub rule_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub nights: u32,
    pub breakdown: PriceBreakdown,
    pub per_night: Vec<NightlyRate>,
}

/// Resolves nightly prices from admin pricing rules and builds stay quotes.
pub struct PricingEngine {
    policy: PricingPolicy,
    stay: BookingRules,
}

impl PricingEngine {
    pub fn new(policy: PricingPolicy) -> Self {
        Self {
            policy,
            stay: BookingRules::default(),
        }
    }

    /// Quotes outside `min_nights..=max_nights` are refused, as bookings are.
    pub fn with_stay_rules(mut self, stay: BookingRules) -> Self {
        self.stay = stay;
        self
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    /// Price for one night. Among active rules covering the date the most
    /// recently created one wins; with none, the property's base rate applies.
    /// Equal creation times keep the earlier rule in `rules`, which stores list newest first.
    pub fn nightly_rate(&self, rules: &[PricingRule], date: NaiveDate, base_rate: i64) -> NightlyRate {
        let winner = rules
            .iter()
            .filter(|r| r.active && r.covers(date))
            .fold(None::<&PricingRule>, |best, r| match best {
                Some(b) if b.created_at >= r.created_at => Some(b),
                _ => Some(r),
            });

        match winner {
            Some(rule) => NightlyRate {
                date,
                price: rule.price,
                rule_id: Some(rule.id),
            },
            None => NightlyRate {
                date,
                price: base_rate,
                rule_id: None,
            },
        }
    }

    /// Full price of a stay, including fees and taxes.
    pub fn quote(
        &self,
        rules: &[PricingRule],
        check_in: NaiveDate,
        check_out: NaiveDate,
        base_rate: i64,
        cleaning_fee: i64,
    ) -> Result<Quote, PricingError> {
        if check_in >= check_out {
            return Err(PricingError::Invalid(
                "check-out must be after check-in".to_string(),
            ));
        }
        if base_rate < 0 || cleaning_fee < 0 {
            return Err(PricingError::Invalid(
                "rates must not be negative".to_string(),
            ));
        }
        let stay = nights(check_in, check_out);
        if stay < i64::from(self.stay.min_nights) || stay > i64::from(self.stay.max_nights) {
            return Err(PricingError::Invalid(format!(
                "stay must be between {} and {} nights",
                self.stay.min_nights, self.stay.max_nights
            )));
        }

        let per_night: Vec<NightlyRate> = dates_in_range(check_in, check_out)
            .into_iter()
            .map(|date| self.nightly_rate(rules, date, base_rate))
            .collect();

        let too_large = || PricingError::Invalid("price is too large".to_string());
        let base = per_night
            .iter()
            .try_fold(0i64, |sum, n| sum.checked_add(n.price))
            .ok_or_else(too_large)?;
        let service_fee = round_minor(base as f64 * self.policy.service_fee_rate);
        let taxable = base
            .checked_add(cleaning_fee)
            .and_then(|v| v.checked_add(service_fee))
            .ok_or_else(too_large)?;
        let taxes = round_minor(taxable as f64 * self.policy.tax_rate);

        let mut breakdown = PriceBreakdown {
            base,
            cleaning_fee,
            service_fee,
            taxes,
            total: 0,
            currency: self.policy.currency.clone(),
        };
        breakdown.total = breakdown.components_total().ok_or_else(too_large)?;

        Ok(Quote {
            nights: stay as u32,
            breakdown,
            per_night,
        })
    }
}

fn round_minor(value: f64) -> i64 {
    value.round() as i64
}
