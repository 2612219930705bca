//! Checkout and order administration.

use std::sync::Arc;

use chrono::Utc;

use tasfiya_core::{
    Locale, NotificationKind, OrderId, OrderStatus, PaymentStatus, Phone, UserId,
};

use crate::db::RepositoryError;
use crate::error::{AppError, Result};
use crate::models::order::{SnapshotError, generate_order_number};
use crate::models::setting::keys;
use crate::models::{
    CartOwner, CheckoutDetails, NewNotification, NewOrder, Order, OrderFilter, SettingsSnapshot,
};
use crate::state::AppState;

/// Fresh order numbers tried before giving up on a collision streak.
const ORDER_NUMBER_ATTEMPTS: usize = 3;

pub struct OrderService<'a> {
    state: &'a AppState,
    locale: Locale,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self {
            state,
            locale: Locale::En,
        }
    }

    /// Render customer-facing refusals in `locale`.
    #[must_use]
    pub const fn localized(mut self, locale: Locale) -> Self {
        self.locale = locale;
        self
    }

    /// Turn the owner's cart into an order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when checkout is switched off,
    /// `AppError::BadRequest` for bad details or an unusable cart.
    pub async fn checkout(&self, owner: CartOwner, details: CheckoutDetails) -> Result<Order> {
        let details = details.normalized().map_err(AppError::BadRequest)?;
        let settings = self.state.settings_snapshot().await?;
        if !settings.get_bool(keys::CHECKOUT_ENABLED, true) {
            return Err(AppError::Conflict(
                "checkout is currently disabled".to_owned(),
            ));
        }

        let order = self.create_with_fresh_number(owner, details).await?;
        tracing::info!(
            order_id = %order.id,
            order_number = %order.order_number,
            total = %order.total,
            items = order.items.len(),
            "Order placed"
        );

        self.state
            .notifier()
            .notify_admins_logged(
                NotificationKind::NewOrder,
                &format!("New order {}", order.order_number),
                &format!("{} placed an order totalling {}", order.customer_name, order.total),
                Some(&format!("/admin/orders/{}", order.id)),
            )
            .await;

        if settings.get_bool(keys::SMS_ORDER_NOTIFICATIONS, false) {
            self.state
                .sms()
                .send_logged(&order.phone, &confirmation_sms(&order))
                .await;
        }

        Ok(order)
    }

    async fn create_with_fresh_number(
        &self,
        owner: CartOwner,
        details: CheckoutDetails,
    ) -> Result<Order> {
        let mut last_conflict = None;
        for _ in 0..ORDER_NUMBER_ATTEMPTS {
            let request = NewOrder {
                owner,
                order_number: generate_order_number(Utc::now()),
                details: details.clone(),
            };
            match self.state.storage().create_order(request).await {
                Ok(Ok(order)) => return Ok(order),
                Ok(Err(reason)) => return Err(snapshot_error(reason, self.locale)),
                Err(RepositoryError::Conflict(msg)) => {
                    tracing::warn!(%msg, "Order number collision, retrying");
                    last_conflict = Some(msg);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(AppError::Internal(format!(
            "could not allocate an order number: {}",
            last_conflict.unwrap_or_default()
        )))
    }

    /// A customer's own orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn list_for_user(&self, user: UserId) -> Result<Vec<Order>> {
        Ok(self.state.storage().list_user_orders(user).await?)
    }

    /// One of the customer's orders.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when the order does not exist or belongs
    /// to someone else.
    pub async fn get_for_user(&self, user: UserId, id: OrderId) -> Result<Order> {
        self.state
            .storage()
            .get_order(id)
            .await?
            .filter(|o| o.user_id == Some(user))
            .ok_or_else(|| AppError::NotFound("order not found".to_owned()))
    }

    /// Guest tracking by order number and the phone used at checkout.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` unless both match, so that a wrong phone
    /// does not reveal that the number exists.
    pub async fn track(&self, order_number: &str, phone: &str) -> Result<Order> {
        let not_found = || AppError::NotFound("order not found".to_owned());
        let phone = Phone::parse(phone).map_err(|_| not_found())?;
        self.state
            .storage()
            .get_order_by_number(order_number.trim())
            .await?
            .filter(|o| o.phone == phone)
            .ok_or_else(not_found)
    }

    /// # Errors
    ///
    /// Returns `AppError::Database` on storage failure.
    pub async fn list(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        Ok(self.state.storage().list_orders(filter).await?)
    }

    /// # Errors
    ///
    /// Returns `AppError::NotFound` for an unknown id.
    pub async fn get(&self, id: OrderId) -> Result<Order> {
        self.state
            .storage()
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("order not found".to_owned()))
    }

    /// Move an order along the fulfillment workflow.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Conflict` when the move is not in the transition
    /// table, or when the order changed since it was read.
    pub async fn update_status(&self, id: OrderId, to: OrderStatus) -> Result<Order> {
        let current = self.get(id).await?;
        if !current.status.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "cannot change order status from {} to {to}",
                current.status
            )));
        }
        let order = self
            .state
            .storage()
            .update_order_status(id, current.status, to)
            .await?;
        tracing::info!(order_id = %id, from = %current.status, to = %to, "Order status changed");

        if let Some(user) = order.user_id {
            self.state
                .notifier()
                .notify_logged(
                    NewNotification::new(
                        user,
                        NotificationKind::StatusUpdate,
                        format!("Order {} is {to}", order.order_number),
                        format!("Your order {} is now {to}.", order.order_number),
                    )
                    .with_link(format!("/account/orders/{}", order.id)),
                )
                .await;
        }

        // The status is already stored; a settings failure only skips the SMS.
        if order_sms_enabled(self.state.settings_snapshot().await) {
            self.state
                .sms()
                .send_logged(&order.phone, &status_sms(&order))
                .await;
        }

        Ok(order)
    }

    /// Record a payment status change made by an administrator.
    ///
    /// # Errors
    ///
    /// Same as [`Self::update_status`].
    pub async fn update_payment_status(&self, id: OrderId, to: PaymentStatus) -> Result<Order> {
        let current = self.get(id).await?;
        if !current.payment_status.can_transition_to(to) {
            return Err(AppError::Conflict(format!(
                "cannot change payment status from {} to {to}",
                current.payment_status
            )));
        }
        let order = self
            .state
            .storage()
            .update_payment_status(id, current.payment_status, to)
            .await?;
        tracing::info!(
            order_id = %id,
            from = %current.payment_status,
            to = %to,
            "Payment status changed"
        );
        Ok(order)
    }
}

fn order_sms_enabled(
    settings: std::result::Result<Arc<SettingsSnapshot>, RepositoryError>,
) -> bool {
    match settings {
        Ok(settings) => settings.get_bool(keys::SMS_ORDER_NOTIFICATIONS, false),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load settings, skipping order SMS");
            false
        }
    }
}

fn snapshot_error(reason: SnapshotError, locale: Locale) -> AppError {
    match reason {
        SnapshotError::Overflow(e) => AppError::BadRequest(format!("order is too large: {e}")),
        SnapshotError::SoldOut(title) => {
            AppError::BadRequest(format!("\"{}\" is sold out", title.get(locale)))
        }
        other => AppError::BadRequest(other.to_string()),
    }
}

fn confirmation_sms(order: &Order) -> String {
    format!(
        "Tasfiya: we received your order {number} (total {total}). We will contact you soon.\n\
         تصفية: تم استلام طلبك {number} (الإجمالي {total}). سنتواصل معك قريباً.",
        number = order.order_number,
        total = order.total,
    )
}

fn status_sms(order: &Order) -> String {
    let (en, ar) = match order.status {
        OrderStatus::Pending => ("is pending", "قيد الانتظار"),
        OrderStatus::Confirmed => ("has been confirmed", "تم تأكيده"),
        OrderStatus::Processing => ("is being prepared", "قيد التجهيز"),
        OrderStatus::Shipped => ("has been shipped", "تم شحنه"),
        OrderStatus::Delivered => ("has been delivered", "تم توصيله"),
        OrderStatus::Cancelled => ("has been cancelled", "تم إلغاؤه"),
    };
    format!(
        "Tasfiya: your order {number} {en}.\nتصفية: طلبك {number} {ar}.",
        number = order.order_number,
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tasfiya_core::{Money, PaymentMethod, ProductStatus, UserRole};

    use super::*;
    use crate::db::{CartRepository, NotificationRepository, SettingsRepository, SmsRepository};
    use crate::services::testing;

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            customer_name: "Omar".to_owned(),
            phone: Phone::parse("0551234567").unwrap(),
            address: "12 Palm St".to_owned(),
            city: "Riyadh".to_owned(),
            notes: None,
            payment_method: PaymentMethod::CashOnDelivery,
        }
    }

    #[tokio::test]
    async fn test_checkout_totals_and_notifies_admins() {
        let state = testing::state();
        let admin = testing::user(&state, "0500000001", UserRole::Admin).await;
        let customer = testing::user(&state, "0500000002", UserRole::Customer).await;
        let chair = testing::product(&state, 12_000, ProductStatus::Available).await;
        let lamp = testing::product(&state, 2_550, ProductStatus::Limited).await;
        let owner = CartOwner::User(customer);
        state.storage().add_cart_item(&owner, chair, 1).await.unwrap();
        state.storage().add_cart_item(&owner, lamp, 3).await.unwrap();

        let order = OrderService::new(&state)
            .checkout(owner, details())
            .await
            .unwrap();

        assert_eq!(order.total, Money::new(12_000 + 2_550 * 3));
        assert_eq!(order.total, order.items_total().unwrap());
        assert_eq!(order.user_id, Some(customer));
        assert!(state.storage().cart_items(&owner).await.unwrap().is_empty());
        assert_eq!(state.storage().unread_count(admin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_checkout_respects_switch() {
        let state = testing::state();
        state
            .storage()
            .upsert_setting(keys::CHECKOUT_ENABLED, "false", "store", tasfiya_core::SettingType::Boolean)
            .await
            .unwrap();
        let lamp = testing::product(&state, 100, ProductStatus::Available).await;
        let owner = CartOwner::User(UserId::new(99));
        state.storage().add_cart_item(&owner, lamp, 1).await.unwrap();

        assert!(matches!(
            OrderService::new(&state).checkout(owner, details()).await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let state = testing::state();
        let owner = CartOwner::User(UserId::new(5));
        assert!(matches!(
            OrderService::new(&state).checkout(owner, details()).await,
            Err(AppError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_status_follows_transition_table() {
        let state = testing::state();
        let customer = testing::user(&state, "0500000002", UserRole::Customer).await;
        let lamp = testing::product(&state, 100, ProductStatus::Available).await;
        let owner = CartOwner::User(customer);
        state.storage().add_cart_item(&owner, lamp, 1).await.unwrap();
        let service = OrderService::new(&state);
        let order = service.checkout(owner, details()).await.unwrap();

        assert!(matches!(
            service.update_status(order.id, OrderStatus::Shipped).await,
            Err(AppError::Conflict(_))
        ));
        let confirmed = service
            .update_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);
        assert_eq!(state.storage().unread_count(customer).await.unwrap(), 1);

        assert!(matches!(
            service
                .update_payment_status(order.id, PaymentStatus::Refunded)
                .await,
            Err(AppError::Conflict(_))
        ));
        let paid = service
            .update_payment_status(order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        assert_eq!(paid.payment_status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_status_sms_when_enabled() {
        let state = testing::state();
        state
            .storage()
            .upsert_setting(
                keys::SMS_ORDER_NOTIFICATIONS,
                "true",
                "internal",
                tasfiya_core::SettingType::Boolean,
            )
            .await
            .unwrap();
        let lamp = testing::product(&state, 100, ProductStatus::Available).await;
        let owner = CartOwner::Guest(uuid::Uuid::new_v4());
        state.storage().add_cart_item(&owner, lamp, 1).await.unwrap();
        let service = OrderService::new(&state);
        let order = service.checkout(owner, details()).await.unwrap();
        service
            .update_status(order.id, OrderStatus::Confirmed)
            .await
            .unwrap();

        let log = state.storage().list_sms(10).await.unwrap();
        assert_eq!(log.len(), 2);
        assert!(log.iter().all(|m| m.recipient == order.phone));
    }

    #[test]
    fn test_settings_failure_after_status_change_skips_sms() {
        assert!(!order_sms_enabled(Err(RepositoryError::Database(
            sqlx::Error::PoolTimedOut
        ))));
        assert!(!order_sms_enabled(Ok(Arc::new(SettingsSnapshot::new(Vec::new())))));
    }

    #[tokio::test]
    async fn test_track_requires_matching_phone() {
        let state = testing::state();
        let lamp = testing::product(&state, 100, ProductStatus::Available).await;
        let owner = CartOwner::Guest(uuid::Uuid::new_v4());
        state.storage().add_cart_item(&owner, lamp, 1).await.unwrap();
        let service = OrderService::new(&state);
        let order = service.checkout(owner, details()).await.unwrap();

        assert!(service.track(&order.order_number, "055 123 4567").await.is_ok());
        assert!(matches!(
            service.track(&order.order_number, "0559999999").await,
            Err(AppError::NotFound(_))
        ));
    }
}
