//! Public catalog routes.

use axum::{Json, extract::State};

use tasfiya_core::ProductId;

use crate::error::{AppError, Result};
use crate::extract::{ApiPath, ApiQuery};
use crate::models::{Category, Product, ProductDetail, ProductFilter};
use crate::state::AppState;

/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<ProductFilter>,
) -> Result<Json<Vec<Product>>> {
    Ok(Json(state.storage().list_products(&filter).await?))
}

/// GET /api/products/{id}
pub async fn show_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<ProductDetail>> {
    let storage = state.storage();
    let product = storage
        .get_product(id)
        .await?
        .ok_or_else(|| AppError::NotFound("product not found".to_owned()))?;
    let images = storage.list_images(id).await?;
    Ok(Json(ProductDetail { product, images }))
}

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<Category>>> {
    Ok(Json(state.storage().list_categories().await?))
}
