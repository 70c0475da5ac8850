use async_trait::async_trait;
use chrono::{DateTime, Utc};
use haven_core::repository::NotificationRepository;
use haven_core::{AdminNotification, NotificationType, StoreError, StoreResult};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::store_error;

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    notification_type: String,
    title: String,
    message: String,
    payload: Value,
    read: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for AdminNotification {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let notification_type = NotificationType::parse(&row.notification_type).ok_or_else(|| {
            StoreError::Backend(format!("unknown notification type {}", row.notification_type))
        })?;
        Ok(AdminNotification {
            id: row.id,
            notification_type,
            title: row.title,
            message: row.message,
            payload: row.payload,
            read: row.read,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn create(&self, notification: &AdminNotification) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO admin_notifications (id, notification_type, title, message, payload, read, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(notification.id)
        .bind(notification.notification_type.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.payload)
        .bind(notification.read)
        .bind(notification.created_at)
        .execute(&self.pool)
        .await
        .map_err(store_error)?;
        Ok(())
    }

    async fn list(
        &self,
        limit: Option<usize>,
        unread_only: bool,
    ) -> StoreResult<Vec<AdminNotification>> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, notification_type, title, message, payload, read, created_at
            FROM admin_notifications
            WHERE ($1 = FALSE OR read = FALSE)
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(unread_only)
        .bind(limit.map(|l| l as i64))
        .fetch_all(&self.pool)
        .await
        .map_err(store_error)?;
        rows.into_iter().map(AdminNotification::try_from).collect()
    }

    async fn mark_read(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE admin_notifications SET read = TRUE WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> StoreResult<u64> {
        let result = sqlx::query("UPDATE admin_notifications SET read = TRUE WHERE read = FALSE")
            .execute(&self.pool)
            .await
            .map_err(store_error)?;
        Ok(result.rows_affected())
    }

    async fn unread_count(&self) -> StoreResult<u64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM admin_notifications WHERE read = FALSE")
                .fetch_one(&self.pool)
                .await
                .map_err(store_error)?;
        Ok(count as u64)
    }
}
