//! Public auction routes and bidding.

use axum::{Json, extract::State};
use serde::Deserialize;

use tasfiya_core::{AuctionId, AuctionStatus, Money};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::RequireAuth;
use crate::models::Auction;
use crate::services::auctions::{AuctionDetail, AuctionService};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct StatusQuery {
    pub status: Option<AuctionStatus>,
}

/// GET /api/auctions?status=
///
/// Active auctions unless another status is asked for.
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatusQuery>,
) -> Result<Json<Vec<Auction>>> {
    let status = query.status.unwrap_or(AuctionStatus::Active);
    Ok(Json(AuctionService::new(&state).list(Some(status)).await?))
}

/// GET /api/auctions/{id}
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<AuctionId>,
) -> Result<Json<AuctionDetail>> {
    Ok(Json(AuctionService::new(&state).detail(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct BidBody {
    pub amount: Money,
}

/// POST /api/auctions/{id}/bid
pub async fn bid(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<AuctionId>,
    ApiJson(body): ApiJson<BidBody>,
) -> Result<Json<AuctionDetail>> {
    Ok(Json(
        AuctionService::new(&state)
            .place_bid(id, &user, body.amount)
            .await?,
    ))
}
