//! Checkout and customer order routes.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use tasfiya_core::OrderId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery, RequestLocale};
use crate::middleware::{CurrentCart, RequireAuth};
use crate::models::{CheckoutDetails, Order};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// POST /api/checkout
///
/// Guests may check out; the order is then reachable through tracking only.
pub async fn checkout(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    RequestLocale(locale): RequestLocale,
    ApiJson(details): ApiJson<CheckoutDetails>,
) -> Result<(StatusCode, Json<Order>)> {
    let order = OrderService::new(&state)
        .localized(locale)
        .checkout(owner, details)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/customer/orders
pub async fn my_orders(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(&state).list_for_user(user.id).await?))
}

/// GET /api/customer/orders/{id}
pub async fn my_order(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(&state).get_for_user(user.id, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub phone: String,
}

/// GET /api/orders/track/{orderNumber}?phone=
pub async fn track(
    State(state): State<AppState>,
    ApiPath(order_number): ApiPath<String>,
    ApiQuery(query): ApiQuery<TrackQuery>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderService::new(&state)
            .track(&order_number, &query.phone)
            .await?,
    ))
}
