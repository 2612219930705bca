//! Cart routes. The cart belongs to the session user, or to the guest token
//! kept in the session.

use axum::{Json, extract::State};

use tasfiya_core::CartItemId;

use crate::error::Result;
use crate::extract::{ApiJson, ApiPath, RequestLocale};
use crate::middleware::CurrentCart;
use crate::models::CartView;
use crate::models::cart::{AddToCart, UpdateQuantity};
use crate::services::cart::CartService;
use crate::state::AppState;

/// GET /api/cart
pub async fn show(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.storage()).view(&owner).await?))
}

/// POST /api/cart/items
pub async fn add(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    RequestLocale(locale): RequestLocale,
    ApiJson(request): ApiJson<AddToCart>,
) -> Result<Json<CartView>> {
    Ok(Json(
        CartService::new(state.storage())
            .add(&owner, request, locale)
            .await?,
    ))
}

/// PATCH /api/cart/items/{id}
pub async fn update(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    ApiPath(item): ApiPath<CartItemId>,
    ApiJson(request): ApiJson<UpdateQuantity>,
) -> Result<Json<CartView>> {
    Ok(Json(
        CartService::new(state.storage())
            .update(&owner, item, request)
            .await?,
    ))
}

/// DELETE /api/cart/items/{id}
pub async fn remove(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
    ApiPath(item): ApiPath<CartItemId>,
) -> Result<Json<CartView>> {
    Ok(Json(
        CartService::new(state.storage()).remove(&owner, item).await?,
    ))
}

/// DELETE /api/cart
pub async fn clear(
    State(state): State<AppState>,
    CurrentCart(owner): CurrentCart,
) -> Result<Json<CartView>> {
    Ok(Json(CartService::new(state.storage()).clear(&owner).await?))
}
