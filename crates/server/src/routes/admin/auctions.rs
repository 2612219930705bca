//! Auction administration.

use axum::{Json, extract::State, http::StatusCode};

use tasfiya_core::{AuctionId, AuctionStatus};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{Auction, AuctionInput};
use crate::routes::auctions::StatusQuery;
use crate::services::auctions::AuctionService;
use crate::state::AppState;

/// GET /api/admin/auctions?status=
///
/// Every auction unless a status is given.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<Vec<Auction>>> {
    Ok(Json(AuctionService::new(&state).list(query.status).await?))
}

/// POST /api/admin/auctions
pub async fn create(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<AuctionInput>,
) -> Result<(StatusCode, Json<Auction>)> {
    let auction = AuctionService::new(&state).create(input).await?;
    Ok((StatusCode::CREATED, Json(auction)))
}

/// PUT /api/admin/auctions/{id}
pub async fn update(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AuctionId>,
    ApiJson(input): ApiJson<AuctionInput>,
) -> Result<Json<Auction>> {
    Ok(Json(AuctionService::new(&state).update(id, input).await?))
}

async fn transition(state: &AppState, id: AuctionId, to: AuctionStatus) -> Result<Json<Auction>> {
    Ok(Json(AuctionService::new(state).transition(id, to).await?))
}

/// POST /api/admin/auctions/{id}/start
pub async fn start(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AuctionId>,
) -> Result<Json<Auction>> {
    transition(&state, id, AuctionStatus::Active).await
}

/// POST /api/admin/auctions/{id}/end
pub async fn end(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AuctionId>,
) -> Result<Json<Auction>> {
    transition(&state, id, AuctionStatus::Ended).await
}

/// POST /api/admin/auctions/{id}/cancel
pub async fn cancel(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AuctionId>,
) -> Result<Json<Auction>> {
    transition(&state, id, AuctionStatus::Cancelled).await
}
