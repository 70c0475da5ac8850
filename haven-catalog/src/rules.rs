use chrono::NaiveDate;
use haven_core::repository::PricingRuleRepository;
use haven_core::{Clock, PricingRule, RuleType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use crate::pricing::{PricingEngine, PricingError, Quote};

/// Admin input for creating or replacing a pricing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingRuleDraft {
    pub property_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub price: i64,
    pub rule_type: RuleType,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl PricingRuleDraft {
    fn validate(&self) -> Result<(), PricingError> {
        if self.property_id.trim().is_empty() {
            return Err(PricingError::Invalid("property_id is required".to_string()));
        }
        if self.start_date > self.end_date {
            return Err(PricingError::Invalid(
                "start_date must not be after end_date".to_string(),
            ));
        }
        if self.price <= 0 {
            return Err(PricingError::Invalid("price must be positive".to_string()));
        }
        Ok(())
    }
}

/// Pricing-rule CRUD plus quotes over the stored rules.
pub struct PricingRuleService {
    repo: Arc<dyn PricingRuleRepository>,
    engine: PricingEngine,
    clock: Arc<dyn Clock>,
}

impl PricingRuleService {
    pub fn new(repo: Arc<dyn PricingRuleRepository>, engine: PricingEngine, clock: Arc<dyn Clock>) -> Self {
        Self { repo, engine, clock }
    }

    pub async fn create(&self, draft: PricingRuleDraft) -> Result<PricingRule, PricingError> {
        draft.validate()?;
        let now = self.clock.now();
        let rule = PricingRule {
            id: Uuid::new_v4(),
            property_id: draft.property_id,
            start_date: draft.start_date,
            end_date: draft.end_date,
            price: draft.price,
            rule_type: draft.rule_type,
            active: draft.active,
            created_at: now,
            updated_at: now,
        };
        self.repo.create(&rule).await?;
        tracing::info!(rule_id = %rule.id, property_id = %rule.property_id, "Pricing rule created");
        Ok(rule)
    }

    /// Replaces the rule's fields. Creation time is kept, so precedence does not change.
    pub async fn update(&self, id: Uuid, draft: PricingRuleDraft) -> Result<PricingRule, PricingError> {
        draft.validate()?;
        let mut rule = self.repo.get(id).await?.ok_or(PricingError::NotFound(id))?;
        rule.property_id = draft.property_id;
        rule.start_date = draft.start_date;
        rule.end_date = draft.end_date;
        rule.price = draft.price;
        rule.rule_type = draft.rule_type;
        rule.active = draft.active;
        rule.updated_at = self.clock.now();
        self.repo.update(&rule).await?;
        Ok(rule)
    }

    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<PricingRule, PricingError> {
        let mut rule = self.repo.get(id).await?.ok_or(PricingError::NotFound(id))?;
        rule.active = active;
        rule.updated_at = self.clock.now();
        self.repo.update(&rule).await?;
        Ok(rule)
    }

    pub async fn delete(&self, id: Uuid) -> Result<(), PricingError> {
        match self.repo.delete(id).await {
            Err(haven_core::StoreError::NotFound) => Err(PricingError::NotFound(id)),
            other => Ok(other?),
        }
    }

    pub async fn list_for_property(&self, property_id: &str) -> Result<Vec<PricingRule>, PricingError> {
        Ok(self.repo.list_for_property(property_id).await?)
    }

    pub async fn quote(
        &self,
        property_id: &str,
        check_in: NaiveDate,
        check_out: NaiveDate,
        base_rate: i64,
        cleaning_fee: i64,
    ) -> Result<Quote, PricingError> {
        let rules = self.repo.list_for_property(property_id).await?;
        self.engine.quote(&rules, check_in, check_out, base_rate, cleaning_fee)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use haven_core::{FixedClock, PricingPolicy};
    use haven_store::memory::MemoryStore;

    fn d(m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, day).unwrap()
    }

    fn service() -> PricingRuleService {
        PricingRuleService::new(
            Arc::new(MemoryStore::new()),
            PricingEngine::new(PricingPolicy::default()),
            Arc::new(FixedClock::on(d(1, 1))),
        )
    }

    fn draft(start: NaiveDate, end: NaiveDate, price: i64) -> PricingRuleDraft {
        PricingRuleDraft {
            property_id: "P1".to_string(),
            start_date: start,
            end_date: end,
            price,
            rule_type: RuleType::Peak,
            active: true,
        }
    }

    #[tokio::test]
    async fn test_create_validates_range_and_price() {
        let service = service();

        let err = service.create(draft(d(6, 10), d(6, 1), 100)).await.unwrap_err();
        assert!(matches!(err, PricingError::Invalid(_)));

        let err = service.create(draft(d(6, 1), d(6, 10), 0)).await.unwrap_err();
        assert!(matches!(err, PricingError::Invalid(_)));

        let rule = service.create(draft(d(6, 1), d(6, 1), 100)).await.unwrap();
        assert_eq!(service.list_for_property("P1").await.unwrap(), vec![rule]);
    }

    #[tokio::test]
    async fn test_toggle_and_delete() {
        let service = service();
        let rule = service.create(draft(d(6, 1), d(6, 30), 90_000)).await.unwrap();

        let quote = service.quote("P1", d(6, 10), d(6, 12), 50_000, 0).await.unwrap();
        assert_eq!(quote.breakdown.base, 180_000);

        service.set_active(rule.id, false).await.unwrap();
        let quote = service.quote("P1", d(6, 10), d(6, 12), 50_000, 0).await.unwrap();
        assert_eq!(quote.breakdown.base, 100_000);

        service.delete(rule.id).await.unwrap();
        assert!(matches!(
            service.delete(rule.id).await,
            Err(PricingError::NotFound(_))
        ));
    }
}
