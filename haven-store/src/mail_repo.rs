use async_trait::async_trait;
use haven_core::mail::{EmailSink, OutboundEmail};
use haven_core::StoreResult;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store_error;

/// Writes mail to the `mail_outbox` table for the external mailer to drain.
pub struct PgMailOutbox {
    pool: PgPool,
}

impl PgMailOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailSink for PgMailOutbox {
    async fn enqueue(&self, email: OutboundEmail) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO mail_outbox (id, recipients, subject, html_body, text_body)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(id)
        .bind(&email.to)
        .bind(&email.subject)
        .bind(&email.html_body)
        .bind(&email.text_body)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        tracing::debug!(mail_id = %id, recipients = email.to.len(), "Mail queued");
        Ok(id)
    }
}
