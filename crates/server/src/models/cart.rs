//! Shopping cart.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use tasfiya_core::{CartItemId, Money, MoneyError, ProductId, UserId};

use super::catalog::Product;

/// Maximum quantity of a single product in one cart line.
pub const MAX_LINE_QUANTITY: i32 = 99;

/// Who a cart belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CartOwner {
    /// A logged-in customer.
    User(UserId),
    /// A visitor identified by the token kept in their session.
    Guest(Uuid),
}

impl CartOwner {
    /// Stable storage key for this owner.
    #[must_use]
    pub fn key(&self) -> String {
        match self {
            Self::User(id) => format!("user:{id}"),
            Self::Guest(token) => format!("guest:{token}"),
        }
    }

    #[must_use]
    pub const fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User(id) => Some(*id),
            Self::Guest(_) => None,
        }
    }
}

/// A stored cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// A cart line joined with its product.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub id: CartItemId,
    pub product: Product,
    pub quantity: i32,
    pub line_total: Money,
}

/// The cart as returned to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub subtotal: Money,
    pub item_count: i32,
}

impl CartView {
    /// Price every line at the current catalog price.
    ///
    /// Lines whose product no longer exists are dropped.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if a line total or the subtotal overflows.
    pub fn build(items: Vec<CartItem>, products: &[Product]) -> Result<Self, MoneyError> {
        let mut lines = Vec::with_capacity(items.len());
        for item in items {
            let Some(product) = products.iter().find(|p| p.id == item.product_id) else {
                continue;
            };
            lines.push(CartLine {
                id: item.id,
                line_total: product.price.checked_times(item.quantity)?,
                product: product.clone(),
                quantity: item.quantity,
            });
        }
        let subtotal = Money::checked_sum(lines.iter().map(|l| l.line_total))?;
        let item_count = lines.iter().map(|l| l.quantity).sum();
        Ok(Self {
            items: lines,
            subtotal,
            item_count,
        })
    }
}

/// Payload for adding a product to the cart.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub product_id: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

/// Payload for changing a line's quantity. Zero removes the line.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantity {
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tasfiya_core::{LocalizedText, ProductStatus};

    use super::*;

    fn product(id: i32, price: i64) -> Product {
        Product {
            id: ProductId::new(id),
            title: LocalizedText::new("Lamp", "مصباح"),
            description: LocalizedText::default(),
            category_id: None,
            price: Money::new(price),
            status: ProductStatus::Available,
            image_url: None,
            display_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn item(id: i32, product_id: i32, quantity: i32) -> CartItem {
        CartItem {
            id: CartItemId::new(id),
            product_id: ProductId::new(product_id),
            quantity,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_owner_keys_are_distinct() {
        let token = Uuid::new_v4();
        assert_eq!(CartOwner::User(UserId::new(5)).key(), "user:5");
        assert_eq!(CartOwner::Guest(token).key(), format!("guest:{token}"));
        assert_eq!(CartOwner::Guest(token).user_id(), None);
    }

    #[test]
    fn test_view_totals() {
        let products = vec![product(1, 1500), product(2, 299)];
        let view = CartView::build(vec![item(1, 1, 2), item(2, 2, 3)], &products).unwrap();
        assert_eq!(view.subtotal, Money::new(1500 * 2 + 299 * 3));
        assert_eq!(view.item_count, 5);
        assert_eq!(view.items.len(), 2);
    }

    #[test]
    fn test_view_drops_missing_products() {
        let products = vec![product(1, 100)];
        let view = CartView::build(vec![item(1, 1, 1), item(2, 9, 4)], &products).unwrap();
        assert_eq!(view.items.len(), 1);
        assert_eq!(view.subtotal, Money::new(100));
    }
}
