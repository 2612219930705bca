//! `PostgreSQL` storage.
//!
//! Queries are checked at runtime (`query_as` into `FromRow` rows) and the
//! rows are converted into the API models at the edge of each module.
//! Localized columns are stored as `<field>_en` / `<field>_ar` pairs.

mod auctions;
mod cart;
mod catalog;
mod intake;
mod notifications;
mod orders;
mod settings;
mod sms;
mod users;

use async_trait::async_trait;
use sqlx::PgPool;

use tasfiya_core::{AppointmentStatus, AuctionStatus, ContactStatus, Money, OrderStatus, PaymentStatus};

use super::{RepositoryError, Storage};
use crate::models::DashboardStats;

/// Storage backed by a `PostgreSQL` pool.
#[derive(Debug, Clone)]
pub struct PgStorage {
    pool: PgPool,
}

impl PgStorage {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Map a unique violation to `Conflict`, anything else to `Database`.
fn unique_violation(err: sqlx::Error, message: &str) -> RepositoryError {
    match err.as_database_error() {
        Some(db) if db.is_unique_violation() => RepositoryError::Conflict(message.to_owned()),
        Some(db) if db.is_foreign_key_violation() => RepositoryError::NotFound,
        _ => RepositoryError::Database(err),
    }
}

/// Escape `%`, `_` and `\` for use inside an `ILIKE` pattern.
fn like_pattern(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len() + 2);
    escaped.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

#[async_trait]
impl Storage for PgStorage {
    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError> {
        let product_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&self.pool)
            .await?;

        let order_counts: Vec<(OrderStatus, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let unread_contacts: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM contacts WHERE status = $1")
                .bind(ContactStatus::New)
                .fetch_one(&self.pool)
                .await?;

        let pending_appointments: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM appointments WHERE status = $1")
                .bind(AppointmentStatus::Pending)
                .fetch_one(&self.pool)
                .await?;

        let active_auctions: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM auctions WHERE status = $1")
                .bind(AuctionStatus::Active)
                .fetch_one(&self.pool)
                .await?;

        let revenue: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE payment_status = $1",
        )
        .bind(PaymentStatus::Paid)
        .fetch_one(&self.pool)
        .await?;

        Ok(DashboardStats {
            product_count,
            orders_by_status: DashboardStats::order_counts(order_counts),
            unread_contacts,
            pending_appointments,
            active_auctions,
            revenue: Money::new(revenue),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("chair"), "%chair%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
