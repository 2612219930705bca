//! Bulk SMS and the send log.

use axum::{Json, extract::State};
use serde::Deserialize;

use crate::error::Result;
use crate::extract::{ApiJson, ApiQuery};
use crate::models::SmsMessage;
use crate::routes::notifications::LimitQuery;
use crate::services::sms::SmsSendSummary;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendBody {
    pub phones: Vec<String>,
    pub message: String,
}

/// POST /api/admin/sms/send
pub async fn send(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendBody>,
) -> Result<Json<SmsSendSummary>> {
    let summary = state.sms().send_bulk(&body.phones, &body.message).await??;
    tracing::info!(sent = summary.sent, failed = summary.failed, "Bulk SMS finished");
    Ok(Json(summary))
}

/// GET /api/admin/sms/messages?limit=
pub async fn messages(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<Vec<SmsMessage>>> {
    Ok(Json(state.storage().list_sms(query.clamped()).await?))
}
