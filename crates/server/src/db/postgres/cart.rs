//! Cart lines, keyed by `CartOwner::key()`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasfiya_core::{CartItemId, ProductId};

use super::{PgStorage, unique_violation};
use crate::db::{CartRepository, RepositoryError};
use crate::models::{CartItem, CartOwner, MAX_LINE_QUANTITY};

#[derive(sqlx::FromRow)]
pub(super) struct CartItemRow {
    id: CartItemId,
    product_id: ProductId,
    quantity: i32,
    created_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(r: CartItemRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            quantity: r.quantity,
            created_at: r.created_at,
        }
    }
}

#[async_trait]
impl CartRepository for PgStorage {
    async fn cart_items(&self, owner: &CartOwner) -> Result<Vec<CartItem>, RepositoryError> {
        let rows: Vec<CartItemRow> = sqlx::query_as(
            "SELECT id, product_id, quantity, created_at FROM cart_items WHERE owner_key = $1 ORDER BY id",
        )
        .bind(owner.key())
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn add_cart_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError> {
        // The conditional upsert returns no row when the merge would overflow.
        let row: Option<CartItemRow> = sqlx::query_as(
            r"
            INSERT INTO cart_items (owner_key, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (owner_key, product_id) DO UPDATE
                SET quantity = cart_items.quantity + EXCLUDED.quantity
                WHERE cart_items.quantity + EXCLUDED.quantity <= $4
            RETURNING id, product_id, quantity, created_at
            ",
        )
        .bind(owner.key())
        .bind(product.as_i32())
        .bind(quantity)
        .bind(MAX_LINE_QUANTITY)
        .fetch_optional(self.pool())
        .await
        .map_err(|e| unique_violation(e, "cart line already exists"))?;

        row.map(Into::into).ok_or_else(|| {
            RepositoryError::Conflict(format!(
                "a cart line cannot exceed {MAX_LINE_QUANTITY} items"
            ))
        })
    }

    async fn set_cart_quantity(
        &self,
        owner: &CartOwner,
        item: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepositoryError> {
        if quantity == 0 {
            self.remove_cart_item(owner, item).await?;
            return Ok(None);
        }
        let row: Option<CartItemRow> = sqlx::query_as(
            r"
            UPDATE cart_items SET quantity = $3
            WHERE id = $1 AND owner_key = $2
            RETURNING id, product_id, quantity, created_at
            ",
        )
        .bind(item.as_i32())
        .bind(owner.key())
        .bind(quantity)
        .fetch_optional(self.pool())
        .await?;
        row.map(|r| Some(r.into())).ok_or(RepositoryError::NotFound)
    }

    async fn remove_cart_item(
        &self,
        owner: &CartOwner,
        item: CartItemId,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND owner_key = $2")
            .bind(item.as_i32())
            .bind(owner.key())
            .execute(self.pool())
            .await?;
        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn clear_cart(&self, owner: &CartOwner) -> Result<(), RepositoryError> {
        sqlx::query("DELETE FROM cart_items WHERE owner_key = $1")
            .bind(owner.key())
            .execute(self.pool())
            .await?;
        Ok(())
    }

    async fn merge_carts(&self, from: &CartOwner, into: &CartOwner) -> Result<(), RepositoryError> {
        let mut tx = self.pool().begin().await?;

        sqlx::query(
            r"
            INSERT INTO cart_items (owner_key, product_id, quantity, created_at)
            SELECT $2, product_id, quantity, created_at
            FROM cart_items
            WHERE owner_key = $1
            ON CONFLICT (owner_key, product_id) DO UPDATE
                SET quantity = LEAST(cart_items.quantity + EXCLUDED.quantity, $3)
            ",
        )
        .bind(from.key())
        .bind(into.key())
        .bind(MAX_LINE_QUANTITY)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM cart_items WHERE owner_key = $1")
            .bind(from.key())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}
