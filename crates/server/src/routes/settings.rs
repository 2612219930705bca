use std::collections::BTreeMap;

use axum::{Json, extract::State};

use crate::error::Result;
use crate::state::AppState;

/// GET /api/settings
///
/// Every non-internal setting as a `{key: value}` map, from the cache.
pub async fn public(State(state): State<AppState>) -> Result<Json<BTreeMap<String, String>>> {
    Ok(Json(state.settings_snapshot().await?.public_values()))
}
