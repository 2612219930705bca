//! Orders and their frozen line items.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use tasfiya_core::{
    LocalizedText, Money, OrderId, OrderItemId, OrderStatus, PaymentMethod, PaymentStatus, Phone,
    ProductId, UserId,
};

use super::cart::CartItemRow;
use super::catalog::{PRODUCT_COLUMNS, ProductRow};
use super::{PgStorage, unique_violation};
use crate::db::{OrderRepository, RepositoryError};
use crate::models::order::{SnapshotError, snapshot_items};
use crate::models::{CartItem, NewOrder, Order, OrderFilter, OrderItem, Product};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    order_number: String,
    user_id: Option<UserId>,
    customer_name: String,
    phone: Phone,
    address: String,
    city: String,
    notes: Option<String>,
    payment_method: PaymentMethod,
    status: OrderStatus,
    payment_status: PaymentStatus,
    total: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> Order {
        Order {
            id: self.id,
            order_number: self.order_number,
            user_id: self.user_id,
            customer_name: self.customer_name,
            phone: self.phone,
            address: self.address,
            city: self.city,
            notes: self.notes,
            payment_method: self.payment_method,
            status: self.status,
            payment_status: self.payment_status,
            total: self.total,
            items,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

const ORDER_COLUMNS: &str = "id, order_number, user_id, customer_name, phone, address, city, \
     notes, payment_method, status, payment_status, total, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    title_en: String,
    title_ar: String,
    unit_price: Money,
    quantity: i32,
    line_total: Money,
}

impl From<OrderItemRow> for OrderItem {
    fn from(r: OrderItemRow) -> Self {
        Self {
            id: r.id,
            product_id: r.product_id,
            title: LocalizedText::new(r.title_en, r.title_ar),
            unit_price: r.unit_price,
            quantity: r.quantity,
            line_total: r.line_total,
        }
    }
}

impl PgStorage {
    /// Attach line items to order rows.
    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows: Vec<OrderItemRow> = sqlx::query_as(
            r"
            SELECT id, order_id, product_id, title_en, title_ar, unit_price, quantity, line_total
            FROM order_items
            WHERE order_id = ANY($1)
            ORDER BY id
            ",
        )
        .bind(&ids)
        .fetch_all(self.pool())
        .await?;

        let mut items: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            items.entry(row.order_id).or_default().push(row.into());
        }
        Ok(rows
            .into_iter()
            .map(|r| {
                let lines = items.remove(&r.id).unwrap_or_default();
                r.into_order(lines)
            })
            .collect())
    }

    async fn one_with_items(&self, row: Option<OrderRow>) -> Result<Option<Order>, RepositoryError> {
        match row {
            Some(row) => Ok(self.with_items(vec![row]).await?.into_iter().next()),
            None => Ok(None),
        }
    }

    /// Distinguish a stale compare-and-set from a missing order.
    async fn stale_or_missing(&self, id: OrderId, what: &str) -> RepositoryError {
        let exists = sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM orders WHERE id = $1)")
            .bind(id.as_i32())
            .fetch_one(self.pool())
            .await;
        match exists {
            Ok(true) => RepositoryError::Conflict(format!("{what} was changed concurrently")),
            Ok(false) => RepositoryError::NotFound,
            Err(e) => RepositoryError::Database(e),
        }
    }
}

#[async_trait]
impl OrderRepository for PgStorage {
    async fn create_order(
        &self,
        order: NewOrder,
    ) -> Result<Result<Order, SnapshotError>, RepositoryError> {
        let owner_key = order.owner.key();
        let mut tx = self.pool().begin().await?;

        let cart_rows: Vec<CartItemRow> = sqlx::query_as(
            r"
            SELECT id, product_id, quantity, created_at
            FROM cart_items
            WHERE owner_key = $1
            ORDER BY id
            FOR UPDATE
            ",
        )
        .bind(&owner_key)
        .fetch_all(&mut *tx)
        .await?;
        let cart: Vec<CartItem> = cart_rows.into_iter().map(Into::into).collect();

        let product_ids: Vec<i32> = cart.iter().map(|i| i.product_id.as_i32()).collect();
        let product_rows: Vec<ProductRow> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1) FOR SHARE"
        ))
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?;
        let products: Vec<Product> = product_rows.into_iter().map(Into::into).collect();

        let (lines, total) = match snapshot_items(&cart, &products) {
            Ok(snapshot) => snapshot,
            Err(e) => return Ok(Err(e)),
        };

        let details = order.details;
        let row: OrderRow = sqlx::query_as(&format!(
            r"
            INSERT INTO orders
                (order_number, user_id, customer_name, phone, address, city, notes,
                 payment_method, total)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(&order.order_number)
        .bind(order.owner.user_id().map(|u| u.as_i32()))
        .bind(&details.customer_name)
        .bind(details.phone.as_str())
        .bind(&details.address)
        .bind(&details.city)
        .bind(details.notes.as_deref())
        .bind(details.payment_method)
        .bind(total.minor_units())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "order number already exists"))?;

        let mut items = Vec::with_capacity(lines.len());
        for line in lines {
            let item: OrderItemRow = sqlx::query_as(
                r"
                INSERT INTO order_items
                    (order_id, product_id, title_en, title_ar, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                RETURNING id, order_id, product_id, title_en, title_ar, unit_price, quantity,
                          line_total
                ",
            )
            .bind(row.id.as_i32())
            .bind(line.product_id.as_i32())
            .bind(&line.title.en)
            .bind(&line.title.ar)
            .bind(line.unit_price.minor_units())
            .bind(line.quantity)
            .bind(line.line_total.minor_units())
            .fetch_one(&mut *tx)
            .await?;
            items.push(item.into());
        }

        sqlx::query("DELETE FROM cart_items WHERE owner_key = $1")
            .bind(&owner_key)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Ok(row.into_order(items)))
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> =
            sqlx::query_as(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
                .bind(id.as_i32())
                .fetch_optional(self.pool())
                .await?;
        self.one_with_items(row).await
    }

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_number = $1"
        ))
        .bind(number)
        .fetch_optional(self.pool())
        .await?;
        self.one_with_items(row).await
    }

    async fn list_user_orders(&self, user: UserId) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY id DESC"
        ))
        .bind(user.as_i32())
        .fetch_all(self.pool())
        .await?;
        self.with_items(rows).await
    }

    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            r"
            SELECT {ORDER_COLUMNS}
            FROM orders
            WHERE ($1::order_status IS NULL OR status = $1)
              AND ($2::payment_status IS NULL OR payment_status = $2)
            ORDER BY id DESC
            "
        ))
        .bind(filter.status)
        .bind(filter.payment_status)
        .fetch_all(self.pool())
        .await?;
        self.with_items(rows).await
    }

    async fn update_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders SET status = $3, updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool())
        .await?;
        match self.one_with_items(row).await? {
            Some(order) => Ok(order),
            None => Err(self.stale_or_missing(id, "order status").await),
        }
    }

    async fn update_payment_status(
        &self,
        id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Order, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            r"
            UPDATE orders SET payment_status = $3, updated_at = NOW()
            WHERE id = $1 AND payment_status = $2
            RETURNING {ORDER_COLUMNS}
            "
        ))
        .bind(id.as_i32())
        .bind(from)
        .bind(to)
        .fetch_optional(self.pool())
        .await?;
        match self.one_with_items(row).await? {
            Some(order) => Ok(order),
            None => Err(self.stale_or_missing(id, "payment status").await),
        }
    }
}
