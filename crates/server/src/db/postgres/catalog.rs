//! Categories, products and product images.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Postgres, Transaction};

use tasfiya_core::{CategoryId, LocalizedText, Money, ProductId, ProductImageId, ProductStatus};

use super::{PgStorage, like_pattern, unique_violation};
use crate::db::{CatalogRepository, RepositoryError};
use crate::models::{
    Category, CategoryInput, NewProductImage, Product, ProductFilter, ProductImage, ProductInput,
};

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: CategoryId,
    name_en: String,
    name_ar: String,
    slug: String,
    display_order: i32,
}

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Self {
            id: r.id,
            name: LocalizedText::new(r.name_en, r.name_ar),
            slug: r.slug,
            display_order: r.display_order,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    title_en: String,
    title_ar: String,
    description_en: String,
    description_ar: String,
    category_id: Option<CategoryId>,
    price: Money,
    status: ProductStatus,
    image_url: Option<String>,
    display_order: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Self {
            id: r.id,
            title: LocalizedText::new(r.title_en, r.title_ar),
            description: LocalizedText::new(r.description_en, r.description_ar),
            category_id: r.category_id,
            price: r.price,
            status: r.status,
            image_url: r.image_url,
            display_order: r.display_order,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

pub(super) const PRODUCT_COLUMNS: &str = "id, title_en, title_ar, description_en, description_ar, \
     category_id, price, status, image_url, display_order, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct ImageRow {
    id: ProductImageId,
    product_id: ProductId,
    url: String,
    alt_en: String,
    alt_ar: String,
    is_main: bool,
    sort_order: i32,
    created_at: DateTime<Utc>,
}

impl From<ImageRow> for ProductImage {
    fn from(r: ImageRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            url: r.url,
            alt: LocalizedText::new(r.alt_en, r.alt_ar),
            is_main: r.is_main,
            sort_order: r.sort_order,
            created_at: r.created_at,
        }
    }
}

const IMAGE_COLUMNS: &str =
    "id, product_id, url, alt_en, alt_ar, is_main, sort_order, created_at";

/// Lock the product row so image changes for one product serialize.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product: ProductId,
) -> Result<(), RepositoryError> {
    sqlx::query("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product.as_i32())
        .fetch_optional(&mut **tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;
    Ok(())
}

/// Make `image` the only main image and mirror its URL onto the product.
async fn promote_main(
    tx: &mut Transaction<'_, Postgres>,
    product: ProductId,
    image: ProductImageId,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE product_images SET is_main = FALSE WHERE product_id = $1 AND is_main")
        .bind(product.as_i32())
        .execute(&mut **tx)
        .await?;
    sqlx::query(
        r"
        WITH main AS (
            UPDATE product_images SET is_main = TRUE
            WHERE id = $2 AND product_id = $1
            RETURNING url
        )
        UPDATE products SET image_url = (SELECT url FROM main), updated_at = NOW()
        WHERE id = $1
        ",
    )
    .bind(product.as_i32())
    .bind(image.as_i32())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

#[async_trait]
impl CatalogRepository for PgStorage {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows: Vec<CategoryRow> = sqlx::query_as(
            "SELECT id, name_en, name_ar, slug, display_order FROM categories ORDER BY display_order, id",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(
            "SELECT id, name_en, name_ar, slug, display_order FROM categories WHERE id = $1",
        )
        .bind(id.as_i32())
        .fetch_optional(self.pool())
        .await?;
        Ok(row.map(Into::into))
    }

    async fn create_category(&self, input: CategoryInput) -> Result<Category, RepositoryError> {
        let row: CategoryRow = sqlx::query_as(
            r"
            INSERT INTO categories (name_en, name_ar, slug, display_order)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name_en, name_ar, slug, display_order
            ",
        )
        .bind(&input.name.en)
        .bind(&input.name.ar)
        .bind(&input.slug)
        .bind(input.display_order)
        .fetch_one(self.pool())
        .await
        .map_err(|e| unique_violation(e, "slug is already used"))?;
        Ok(row.into())
    }

    async fn update_category(
        &self,
        id: CategoryId,
        input: CategoryInput,
    ) -> Result<Category, RepositoryError> {
        let row: Option<CategoryRow> = sqlx::query_as(
            r"
            UPDATE categories
            SET name_en = $2, name_ar = $3, slug = $4, display_order = $5
            WHERE id = $1
            RETURNING id, name_en, name_ar, slug, display_order
            ",
        )
        .bind(id.as_i32())
        .bind(&input.name.en)
        .bind(&input.name.ar)
        .bind(&input.slug)
        .bind(input.display_order)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| unique_violation(e, "slug is already used"))?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError> {
        // products.category_id is ON DELETE SET NULL
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(like_pattern);
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            r"
            SELECT {PRODUCT_COLUMNS}
            FROM products
            WHERE ($1::INTEGER IS NULL OR category_id = $1)
              AND ($2::product_status IS NULL OR status = $2)
              AND ($3::TEXT IS NULL OR title_en ILIKE $3 OR title_ar ILIKE $3)
            ORDER BY display_order, id
            "
        ))
        .bind(filter.category_id.map(|c| c.as_i32()))
        .bind(filter.status)
        .bind(search)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row: Option<ProductRow> =
            sqlx::query_as(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool())
                .await?;
        Ok(row.map(Into::into))
    }

    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) ORDER BY display_order, id"
        ))
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_product(&self, input: ProductInput) -> Result<Product, RepositoryError> {
        let mut tx = self.pool().begin().await?;

        let row: ProductRow = sqlx::query_as(&format!(
            r"
            INSERT INTO products
                (title_en, title_ar, description_en, description_ar, category_id, price, status,
                 display_order)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    COALESCE($8, (SELECT COALESCE(MAX(display_order) + 1, 0) FROM products)))
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(&input.title.en)
        .bind(&input.title.ar)
        .bind(&input.description.en)
        .bind(&input.description.ar)
        .bind(input.category_id.map(|c| c.as_i32()))
        .bind(input.price.minor_units())
        .bind(input.status)
        .bind(input.display_order)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "product conflicts with an existing record"))?;

        let mut product: Product = row.into();

        if let Some(url) = input.image_url {
            sqlx::query(
                "INSERT INTO product_images (product_id, url, is_main, sort_order) VALUES ($1, $2, TRUE, 0)",
            )
            .bind(product.id.as_i32())
            .bind(&url)
            .execute(&mut *tx)
            .await?;
            sqlx::query("UPDATE products SET image_url = $2 WHERE id = $1")
                .bind(product.id.as_i32())
                .bind(&url)
                .execute(&mut *tx)
                .await?;
            product.image_url = Some(url);
        }

        tx.commit().await?;
        Ok(product)
    }

    async fn update_product(
        &self,
        id: ProductId,
        input: ProductInput,
    ) -> Result<Product, RepositoryError> {
        let row: Option<ProductRow> = sqlx::query_as(&format!(
            r"
            UPDATE products
            SET title_en = $2, title_ar = $3, description_en = $4, description_ar = $5,
                category_id = $6, price = $7, status = $8,
                display_order = COALESCE($9, display_order), updated_at = NOW()
            WHERE id = $1
            RETURNING {PRODUCT_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(&input.title.en)
        .bind(&input.title.ar)
        .bind(&input.description.en)
        .bind(&input.description.ar)
        .bind(input.category_id.map(|c| c.as_i32()))
        .bind(input.price.minor_units())
        .bind(input.status)
        .bind(input.display_order)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| unique_violation(e, "product conflicts with an existing record"))?;
        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        lock_product(&mut tx, id).await?;

        let referenced: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM auctions WHERE product_id = $1)")
                .bind(id.as_i32())
                .fetch_one(&mut *tx)
                .await?;
        if referenced {
            return Err(RepositoryError::Conflict(
                "product is referenced by an auction".to_owned(),
            ));
        }

        // Images and cart lines cascade; order items keep their snapshot.
        sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id.as_i32())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn reorder_products(&self, ids: &[ProductId]) -> Result<(), RepositoryError> {
        let ids: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let mut tx = self.pool().begin().await?;

        let known: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_one(&mut *tx)
        .await?;
        let mut distinct = ids.clone();
        distinct.sort_unstable();
        distinct.dedup();
        if usize::try_from(known).ok() != Some(distinct.len()) {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query(
            r"
            UPDATE products p
            SET display_order = (o.idx - 1)::INTEGER, updated_at = NOW()
            FROM UNNEST($1::INTEGER[]) WITH ORDINALITY AS o(id, idx)
            WHERE p.id = o.id
            ",
        )
        .bind(&ids)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_images(&self, product: ProductId) -> Result<Vec<ProductImage>, RepositoryError> {
        let rows: Vec<ImageRow> = sqlx::query_as(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE product_id = $1 ORDER BY sort_order, id"
        ))
        .bind(product.as_i32())
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_image(
        &self,
        product: ProductId,
        image: NewProductImage,
    ) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        lock_product(&mut tx, product).await?;

        let has_main: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM product_images WHERE product_id = $1 AND is_main)",
        )
        .bind(product.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        let row: ImageRow = sqlx::query_as(&format!(
            r"
            INSERT INTO product_images (product_id, url, alt_en, alt_ar, is_main, sort_order)
            VALUES ($1, $2, $3, $4, FALSE,
                    COALESCE($5, (SELECT COALESCE(MAX(sort_order) + 1, 0)
                                  FROM product_images WHERE product_id = $1)))
            RETURNING {IMAGE_COLUMNS}
            "
        ))
        .bind(product.as_i32())
        .bind(&image.url)
        .bind(&image.alt.en)
        .bind(&image.alt.ar)
        .bind(image.sort_order)
        .fetch_one(&mut *tx)
        .await?;

        let mut created: ProductImage = row.into();
        if image.is_main || !has_main {
            promote_main(&mut tx, product, created.id).await?;
            created.is_main = true;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn set_main_image(
        &self,
        product: ProductId,
        image: ProductImageId,
    ) -> Result<ProductImage, RepositoryError> {
        let mut tx = self.pool().begin().await?;
        lock_product(&mut tx, product).await?;

        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM product_images WHERE id = $1 AND product_id = $2)",
        )
        .bind(image.as_i32())
        .bind(product.as_i32())
        .fetch_one(&mut *tx)
        .await?;
        if !exists {
            return Err(RepositoryError::NotFound);
        }

        promote_main(&mut tx, product, image).await?;

        let row: ImageRow = sqlx::query_as(&format!(
            "SELECT {IMAGE_COLUMNS} FROM product_images WHERE id = $1"
        ))
        .bind(image.as_i32())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn delete_image(
        &self,
        product: ProductId,
        image: ProductImageId,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;
        lock_product(&mut tx, product).await?;

        let was_main: bool = sqlx::query_scalar(
            "DELETE FROM product_images WHERE id = $1 AND product_id = $2 RETURNING is_main",
        )
        .bind(image.as_i32())
        .bind(product.as_i32())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        if was_main {
            let next: Option<ProductImageId> = sqlx::query_scalar(
                "SELECT id FROM product_images WHERE product_id = $1 ORDER BY sort_order, id LIMIT 1",
            )
            .bind(product.as_i32())
            .fetch_optional(&mut *tx)
            .await?;

            match next {
                Some(next) => promote_main(&mut tx, product, next).await?,
                None => {
                    sqlx::query(
                        "UPDATE products SET image_url = NULL, updated_at = NOW() WHERE id = $1",
                    )
                    .bind(product.as_i32())
                    .execute(&mut *tx)
                    .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(())
    }
}
