//! Orders created at checkout.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use tasfiya_core::{
    LocalizedText, Money, MoneyError, OrderId, OrderItemId, OrderStatus, PaymentMethod,
    PaymentStatus, Phone, ProductId, UserId,
};

use super::cart::{CartItem, CartOwner};
use super::catalog::Product;

/// Longest accepted free-text field on the checkout form.
const MAX_FIELD_LENGTH: usize = 500;

/// Customer-supplied delivery details.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutDetails {
    pub customer_name: String,
    pub phone: Phone,
    pub address: String,
    pub city: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

impl CheckoutDetails {
    /// # Errors
    ///
    /// Returns a message for the first blank or oversized field.
    pub fn normalized(self) -> Result<Self, String> {
        let customer_name = required("customerName", &self.customer_name)?;
        let address = required("address", &self.address)?;
        let city = required("city", &self.city)?;
        let notes = self
            .notes
            .map(|n| n.trim().to_owned())
            .filter(|n| !n.is_empty());
        if notes.as_ref().is_some_and(|n| n.chars().count() > MAX_FIELD_LENGTH) {
            return Err(format!("notes must be at most {MAX_FIELD_LENGTH} characters"));
        }
        Ok(Self {
            customer_name,
            address,
            city,
            notes,
            ..self
        })
    }
}

fn required(field: &str, value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(format!("{field} is required"));
    }
    if value.chars().count() > MAX_FIELD_LENGTH {
        return Err(format!("{field} must be at most {MAX_FIELD_LENGTH} characters"));
    }
    Ok(value.to_owned())
}

/// A placed order. Items are a frozen snapshot taken at checkout.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub order_number: String,
    pub user_id: Option<UserId>,
    pub customer_name: String,
    pub phone: Phone,
    pub address: String,
    pub city: String,
    pub notes: Option<String>,
    pub payment_method: PaymentMethod,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total: Money,
    pub items: Vec<OrderItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Recompute the total from the items.
    ///
    /// # Errors
    ///
    /// Returns `MoneyError::Overflow` if the sum overflows.
    pub fn items_total(&self) -> Result<Money, MoneyError> {
        Money::checked_sum(self.items.iter().map(|i| i.line_total))
    }
}

/// A frozen order line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    /// `None` once the product has been deleted from the catalog.
    pub product_id: Option<ProductId>,
    pub title: LocalizedText,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// A checkout request. Storage snapshots the owner's cart with
/// [`snapshot_items`] inside the same transaction that stores the order and
/// empties the cart.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub owner: CartOwner,
    pub order_number: String,
    pub details: CheckoutDetails,
}

/// A line to be frozen into an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub title: LocalizedText,
    pub unit_price: Money,
    pub quantity: i32,
    pub line_total: Money,
}

/// Why a cart cannot be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    #[error("cart is empty")]
    EmptyCart,
    #[error("a product in the cart is no longer available")]
    MissingProduct(ProductId),
    #[error("\"{}\" is sold out", .0.en)]
    SoldOut(LocalizedText),
    #[error("order total overflow")]
    Overflow(#[from] MoneyError),
}

/// Freeze cart lines at current catalog prices.
///
/// The returned total is exactly the sum of the returned line totals.
///
/// # Errors
///
/// Returns a [`SnapshotError`] when the cart is empty, references a missing
/// or sold-out product, or the total overflows.
pub fn snapshot_items(
    items: &[CartItem],
    products: &[Product],
) -> Result<(Vec<NewOrderItem>, Money), SnapshotError> {
    if items.is_empty() {
        return Err(SnapshotError::EmptyCart);
    }
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let product = products
            .iter()
            .find(|p| p.id == item.product_id)
            .ok_or(SnapshotError::MissingProduct(item.product_id))?;
        if !product.status.is_purchasable() {
            return Err(SnapshotError::SoldOut(product.title.clone()));
        }
        lines.push(NewOrderItem {
            product_id: product.id,
            title: product.title.clone(),
            unit_price: product.price,
            quantity: item.quantity,
            line_total: product.price.checked_times(item.quantity)?,
        });
    }
    let total = Money::checked_sum(lines.iter().map(|l| l.line_total))?;
    Ok((lines, total))
}

/// Generate a human-readable order number such as `TS-20261015-4F7A9C`.
#[must_use]
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix: u32 = rand::rng().random_range(0..0x0100_0000);
    format!("TS-{}-{suffix:06X}", now.format("%Y%m%d"))
}

/// Admin order list filters.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

impl OrderFilter {
    #[must_use]
    pub fn matches(&self, order: &Order) -> bool {
        self.status.is_none_or(|s| s == order.status)
            && self.payment_status.is_none_or(|s| s == order.payment_status)
    }
}
