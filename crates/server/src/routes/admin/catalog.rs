//! Product, gallery and category management.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;

use tasfiya_core::{CategoryId, ProductId, ProductImageId};

use crate::db::Storage;
use crate::error::{AppError, Result};
use crate::extract::{ApiJson, ApiPath};
use crate::models::{
    Category, CategoryInput, NewProductImage, Product, ProductImage, ProductInput,
};
use crate::state::AppState;

async fn validated(storage: &dyn Storage, input: ProductInput) -> Result<ProductInput> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    if let Some(category) = input.category_id
        && storage.get_category(category).await?.is_none()
    {
        return Err(AppError::BadRequest(format!("unknown category {category}")));
    }
    Ok(input)
}

/// POST /api/admin/products
pub async fn create_product(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<(StatusCode, Json<Product>)> {
    let storage = state.storage();
    let product = storage
        .create_product(validated(storage, input).await?)
        .await?;
    tracing::info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

/// PUT /api/admin/products/{id}
pub async fn update_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(input): ApiJson<ProductInput>,
) -> Result<Json<Product>> {
    let storage = state.storage();
    let input = validated(storage, input).await?;
    Ok(Json(storage.update_product(id, input).await?))
}

/// DELETE /api/admin/products/{id}
pub async fn delete_product(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<StatusCode> {
    state.storage().delete_product(id).await?;
    tracing::info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReorderBody {
    pub ids: Vec<ProductId>,
}

/// POST /api/admin/products/reorder
pub async fn reorder_products(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<ReorderBody>,
) -> Result<StatusCode> {
    let mut seen = std::collections::HashSet::new();
    if !body.ids.iter().all(|id| seen.insert(*id)) {
        return Err(AppError::BadRequest("duplicate product id".to_owned()));
    }
    state.storage().reorder_products(&body.ids).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/admin/products/{id}/images
pub async fn list_images(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
) -> Result<Json<Vec<ProductImage>>> {
    Ok(Json(state.storage().list_images(id).await?))
}

/// POST /api/admin/products/{id}/images
pub async fn add_image(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<ProductId>,
    ApiJson(image): ApiJson<NewProductImage>,
) -> Result<(StatusCode, Json<ProductImage>)> {
    let image = image.normalized().map_err(AppError::BadRequest)?;
    let image = state.storage().add_image(id, image).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

/// PUT /api/admin/products/{id}/images/{imageId}/main
pub async fn set_main_image(
    State(state): State<AppState>,
    ApiPath((id, image)): ApiPath<(ProductId, ProductImageId)>,
) -> Result<Json<ProductImage>> {
    Ok(Json(state.storage().set_main_image(id, image).await?))
}

/// DELETE /api/admin/products/{id}/images/{imageId}
pub async fn delete_image(
    State(state): State<AppState>,
    ApiPath((id, image)): ApiPath<(ProductId, ProductImageId)>,
) -> Result<StatusCode> {
    state.storage().delete_image(id, image).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/admin/categories
pub async fn create_category(
    State(state): State<AppState>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<(StatusCode, Json<Category>)> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    let category = state.storage().create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

/// PUT /api/admin/categories/{id}
pub async fn update_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
    ApiJson(input): ApiJson<CategoryInput>,
) -> Result<Json<Category>> {
    let input = input.normalized().map_err(AppError::BadRequest)?;
    Ok(Json(state.storage().update_category(id, input).await?))
}

/// DELETE /api/admin/categories/{id}
pub async fn delete_category(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<CategoryId>,
) -> Result<StatusCode> {
    state.storage().delete_category(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
