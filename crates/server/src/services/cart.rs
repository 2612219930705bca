//! Cart operations.

use tasfiya_core::{CartItemId, Locale};

use crate::db::Storage;
use crate::error::{AppError, Result};
use crate::models::cart::{AddToCart, UpdateQuantity};
use crate::models::{CartOwner, CartView, MAX_LINE_QUANTITY};

pub struct CartService<'a> {
    storage: &'a dyn Storage,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(storage: &'a dyn Storage) -> Self {
        Self { storage }
    }

    /// The owner's cart priced at current catalog prices.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn view(&self, owner: &CartOwner) -> Result<CartView> {
        let items = self.storage.cart_items(owner).await?;
        let ids: Vec<_> = items.iter().map(|i| i.product_id).collect();
        let products = self.storage.get_products(&ids).await?;
        Ok(CartView::build(items, &products)?)
    }

    /// Add a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an out-of-range quantity or a
    /// sold-out product, `AppError::NotFound` for an unknown product and
    /// `AppError::Database(Conflict)` when the merged line would exceed the
    /// maximum. The sold-out message names the product in `locale`.
    pub async fn add(
        &self,
        owner: &CartOwner,
        request: AddToCart,
        locale: Locale,
    ) -> Result<CartView> {
        check_quantity(request.quantity, 1)?;
        let product = self
            .storage
            .get_product(request.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("product not found".to_owned()))?;
        if !product.status.is_purchasable() {
            return Err(AppError::BadRequest(format!(
                "\"{}\" is sold out",
                product.title.get(locale)
            )));
        }
        self.storage
            .add_cart_item(owner, product.id, request.quantity)
            .await?;
        self.view(owner).await
    }

    /// Change a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::BadRequest` for an out-of-range quantity and
    /// `AppError::Database(NotFound)` if the line is not the owner's.
    pub async fn update(
        &self,
        owner: &CartOwner,
        item: CartItemId,
        request: UpdateQuantity,
    ) -> Result<CartView> {
        check_quantity(request.quantity, 0)?;
        self.storage
            .set_cart_quantity(owner, item, request.quantity)
            .await?;
        self.view(owner).await
    }

    /// # Errors
    ///
    /// Returns `AppError::Database(NotFound)` if the line is not the owner's.
    pub async fn remove(&self, owner: &CartOwner, item: CartItemId) -> Result<CartView> {
        self.storage.remove_cart_item(owner, item).await?;
        self.view(owner).await
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn clear(&self, owner: &CartOwner) -> Result<CartView> {
        self.storage.clear_cart(owner).await?;
        self.view(owner).await
    }

    /// Fold a guest cart into the user's cart after login.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn merge(&self, guest: &CartOwner, user: &CartOwner) -> Result<()> {
        self.storage.merge_carts(guest, user).await?;
        tracing::debug!(from = %guest.key(), into = %user.key(), "Merged guest cart");
        Ok(())
    }
}

fn check_quantity(quantity: i32, min: i32) -> Result<()> {
    if (min..=MAX_LINE_QUANTITY).contains(&quantity) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "quantity must be between {min} and {MAX_LINE_QUANTITY}"
        )))
    }
}
