//! Order administration.

use axum::{Json, extract::State};
use serde::Deserialize;

use tasfiya_core::{OrderId, OrderStatus, PaymentStatus};

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::models::{Order, OrderFilter};
use crate::services::orders::OrderService;
use crate::state::AppState;

/// GET /api/admin/orders?status=&paymentStatus=
pub async fn list(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<OrderFilter>,
) -> Result<Json<Vec<Order>>> {
    Ok(Json(OrderService::new(&state).list(&filter).await?))
}

/// GET /api/admin/orders/{id}
pub async fn show(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
) -> Result<Json<Order>> {
    Ok(Json(OrderService::new(&state).get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    pub status: OrderStatus,
}

/// PATCH /api/admin/orders/{id}/status
pub async fn update_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<StatusBody>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderService::new(&state)
            .update_status(id, body.status)
            .await?,
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusBody {
    pub payment_status: PaymentStatus,
}

/// PATCH /api/admin/orders/{id}/payment-status
pub async fn update_payment_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<OrderId>,
    ApiJson(body): ApiJson<PaymentStatusBody>,
) -> Result<Json<Order>> {
    Ok(Json(
        OrderService::new(&state)
            .update_payment_status(id, body.payment_status)
            .await?,
    ))
}
