use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::notifications::model::{Notification, NotificationType};

#[derive(Clone)]
pub struct NotificationsRepo {
    pool: PgPool,
}

impl NotificationsRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        recipient_id: Uuid,
        kind: NotificationType,
        title: &str,
        body: &str,
        payload: Option<Value>,
    ) -> anyhow::Result<Uuid> {
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (recipient_id, notification_type, title, body, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(recipient_id)
        .bind(kind.as_str())
        .bind(title)
        .bind(body)
        .bind(payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// Newest first. Cursor is (created_at, id) of the last item seen.
    pub async fn list_for(
        &self,
        recipient_id: Uuid,
        limit: i64,
        cursor: Option<(DateTime<Utc>, Uuid)>,
    ) -> anyhow::Result<Vec<Notification>> {
        let limit = limit.clamp(1, 200);

        let rows = match cursor {
            Some((created_at, id)) => {
                sqlx::query_as::<_, Notification>(
                    r#"
                    SELECT * FROM notifications
                    WHERE recipient_id = $1 AND is_deleted = FALSE
                      AND (created_at, id) < ($2, $3)
                    ORDER BY created_at DESC, id DESC
                    LIMIT $4
                    "#,
                )
                .bind(recipient_id)
                .bind(created_at)
                .bind(id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Notification>(
                    r#"
                    SELECT * FROM notifications
                    WHERE recipient_id = $1 AND is_deleted = FALSE
                    ORDER BY created_at DESC, id DESC
                    LIMIT $2
                    "#,
                )
                .bind(recipient_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows)
    }

    pub async fn mark_read(&self, id: Uuid, recipient_id: Uuid) -> anyhow::Result<bool> {
        let n = sqlx::query(
            r#"
            UPDATE notifications
            SET is_read = TRUE
            WHERE id = $1 AND recipient_id = $2 AND is_deleted = FALSE
            "#,
        )
        .bind(id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(n == 1)
    }
}
