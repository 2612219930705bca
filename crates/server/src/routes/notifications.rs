//! Notification polling. Every route is scoped to the session user.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use tasfiya_core::NotificationId;

use crate::error::Result;
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::RequireAuth;
use crate::models::Notification;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

impl LimitQuery {
    /// Requested limit clamped to `1..=MAX_LIMIT`.
    #[must_use]
    pub fn clamped(&self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// GET /api/notifications?limit=
pub async fn list(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiQuery(query): ApiQuery<LimitQuery>,
) -> Result<Json<Vec<Notification>>> {
    Ok(Json(
        state
            .storage()
            .list_notifications(user.id, query.clamped())
            .await?,
    ))
}

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub count: i64,
}

/// GET /api/notifications/unread-count
pub async fn unread_count(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<UnreadCount>> {
    let count = state.storage().unread_count(user.id).await?;
    Ok(Json(UnreadCount { count }))
}

/// PATCH /api/notifications/{id}/read
pub async fn mark_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<NotificationId>,
) -> Result<Json<Notification>> {
    Ok(Json(state.storage().mark_read(user.id, id).await?))
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub updated: u64,
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<MarkedRead>> {
    let updated = state.storage().mark_all_read(user.id).await?;
    Ok(Json(MarkedRead { updated }))
}
