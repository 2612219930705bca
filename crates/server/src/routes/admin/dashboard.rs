use axum::{Json, extract::State};

use crate::error::Result;
use crate::models::DashboardStats;
use crate::state::AppState;

/// GET /api/admin/dashboard
pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.storage().dashboard_stats().await?))
}
