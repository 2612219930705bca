//! Settings administration. Writes go through [`SettingsService`] so the
//! cached snapshot is invalidated.
//!
//! [`SettingsService`]: crate::services::settings::SettingsService

use axum::{Json, extract::State, http::StatusCode};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath};
use crate::models::{Setting, SettingInput};
use crate::state::AppState;

/// GET /api/admin/settings
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Setting>>> {
    Ok(Json(state.storage().list_settings().await?))
}

/// PUT /api/admin/settings/{key}
pub async fn put(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
    ApiJson(input): ApiJson<SettingInput>,
) -> Result<Json<Setting>> {
    let setting = state.settings().put(state.storage(), &key, input).await?;
    tracing::info!(key = %setting.key, "Setting updated");
    Ok(Json(setting))
}

/// DELETE /api/admin/settings/{key}
pub async fn delete(
    State(state): State<AppState>,
    ApiPath(key): ApiPath<String>,
) -> Result<StatusCode> {
    state.settings().delete(state.storage(), &key).await?;
    Ok(StatusCode::NO_CONTENT)
}
