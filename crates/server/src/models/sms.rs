//! Outgoing SMS log.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tasfiya_core::{Phone, SmsMessageId, SmsStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    pub id: SmsMessageId,
    pub recipient: Phone,
    pub body: String,
    pub status: SmsStatus,
    /// Provider message id on success.
    pub provider_id: Option<String>,
    /// Failure reason on error.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSmsMessage {
    pub recipient: Phone,
    pub body: String,
    pub status: SmsStatus,
    pub provider_id: Option<String>,
    pub error: Option<String>,
}
