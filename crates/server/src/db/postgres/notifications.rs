//! Notifications.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasfiya_core::{NotificationId, NotificationKind, UserId};

use super::PgStorage;
use crate::db::{NotificationRepository, RepositoryError};
use crate::models::{NewNotification, Notification};

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: NotificationId,
    user_id: UserId,
    kind: NotificationKind,
    title: String,
    message: String,
    link: Option<String>,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl From<NotificationRow> for Notification {
    fn from(r: NotificationRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            kind: r.kind,
            title: r.title,
            message: r.message,
            link: r.link,
            is_read: r.is_read,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl NotificationRepository for PgStorage {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError> {
        let row: NotificationRow = sqlx::query_as(
            r"
            INSERT INTO notifications (user_id, kind, title, message, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, user_id, kind, title, message, link, is_read, created_at
            ",
        )
        .bind(notification.user_id.as_i32())
        .bind(notification.kind)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.link.as_deref())
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list_notifications(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows: Vec<NotificationRow> = sqlx::query_as(
            r"
            SELECT id, user_id, kind, title, message, link, is_read, created_at
            FROM notifications
            WHERE user_id = $1
            ORDER BY id DESC
            LIMIT $2
            ",
        )
        .bind(user.as_i32())
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn unread_count(&self, user: UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user.as_i32())
        .fetch_one(self.pool())
        .await?;
        Ok(count)
    }

    async fn mark_read(
        &self,
        user: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError> {
        let row: Option<NotificationRow> = sqlx::query_as(
            r"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1 AND user_id = $2
            RETURNING id, user_id, kind, title, message, link, is_read, created_at
            ",
        )
        .bind(id.as_i32())
        .bind(user.as_i32())
        .fetch_optional(self.pool())
        .await?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError> {
        let result =
            sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
                .bind(user.as_i32())
                .execute(self.pool())
                .await?;
        Ok(result.rows_affected())
    }
}
