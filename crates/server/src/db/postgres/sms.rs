//! SMS log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasfiya_core::{Phone, SmsMessageId, SmsStatus};

use super::PgStorage;
use crate::db::{RepositoryError, SmsRepository};
use crate::models::{NewSmsMessage, SmsMessage};

#[derive(sqlx::FromRow)]
struct SmsRow {
    id: SmsMessageId,
    recipient: Phone,
    body: String,
    status: SmsStatus,
    provider_id: Option<String>,
    error: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SmsRow> for SmsMessage {
    fn from(r: SmsRow) -> Self {
        Self {
            id: r.id,
            recipient: r.recipient,
            body: r.body,
            status: r.status,
            provider_id: r.provider_id,
            error: r.error,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl SmsRepository for PgStorage {
    async fn log_sms(&self, message: NewSmsMessage) -> Result<SmsMessage, RepositoryError> {
        let row: SmsRow = sqlx::query_as(
            r"
            INSERT INTO sms_messages (recipient, body, status, provider_id, error)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, recipient, body, status, provider_id, error, created_at
            ",
        )
        .bind(message.recipient.as_str())
        .bind(&message.body)
        .bind(message.status)
        .bind(message.provider_id.as_deref())
        .bind(message.error.as_deref())
        .fetch_one(self.pool())
        .await?;
        Ok(row.into())
    }

    async fn list_sms(&self, limit: i64) -> Result<Vec<SmsMessage>, RepositoryError> {
        let rows: Vec<SmsRow> = sqlx::query_as(
            r"
            SELECT id, recipient, body, status, provider_id, error, created_at
            FROM sms_messages
            ORDER BY id DESC
            LIMIT $1
            ",
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
