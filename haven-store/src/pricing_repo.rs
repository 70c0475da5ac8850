use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use haven_core::repository::PricingRuleRepository;
use haven_core::{PricingRule, RuleType, StoreError, StoreResult};
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store_error;

pub struct PgPricingRuleRepository {
    pool: PgPool,
}

impl PgPricingRuleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PricingRuleRow {
    id: Uuid,
    property_id: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    price: i64,
    rule_type: String,
    active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PricingRuleRow> for PricingRule {
    type Error = StoreError;

    fn try_from(row: PricingRuleRow) -> Result<Self, Self::Error> {
        let rule_type = RuleType::parse(&row.rule_type)
            .ok_or_else(|| StoreError::Backend(format!("unknown rule type {}", row.rule_type)))?;
        Ok(PricingRule {
            id: row.id,
            property_id: row.property_id,
            start_date: row.start_date,
            end_date: row.end_date,
            price: row.price,
            rule_type,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PricingRuleRepository for PgPricingRuleRepository {
    async fn create(&self, rule: &PricingRule) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO pricing_rules (id, property_id, start_date, end_date, price, rule_type, active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(rule.id)
        .bind(&rule.property_id)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(rule.price)
        .bind(rule.rule_type.as_str())
        .bind(rule.active)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<PricingRule>> {
        let row = sqlx::query_as::<_, PricingRuleRow>(
            r#"
            SELECT id, property_id, start_date, end_date, price, rule_type, active, created_at, updated_at
            FROM pricing_rules WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_error)?;
        row.map(PricingRule::try_from).transpose()
    }

    async fn update(&self, rule: &PricingRule) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE pricing_rules SET
                property_id = $2, start_date = $3, end_date = $4, price = $5,
                rule_type = $6, active = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(rule.id)
        .bind(&rule.property_id)
        .bind(rule.start_date)
        .bind(rule.end_date)
        .bind(rule.price)
        .bind(rule.rule_type.as_str())
        .bind(rule.active)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM pricing_rules WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list_for_property(&self, property_id: &str) -> StoreResult<Vec<PricingRule>> {
        let rows = sqlx::query_as::<_, PricingRuleRow>(
            r#"
            SELECT id, property_id, start_date, end_date, price, rule_type, active, created_at, updated_at
            FROM pricing_rules WHERE property_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(property_id)
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(PricingRule::try_from).collect()
    }
}
