//! Status enums for various entities.
//!
//! The lifecycle enums (`OrderStatus`, `PaymentStatus`, `AuctionStatus`)
//! carry their transition tables so that both storage backends and the
//! service layer agree on which moves are legal.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error for parsing a status from its wire name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {kind}: {value}")]
pub struct ParseStatusError {
    kind: &'static str,
    value: String,
}

/// Implements `Display`/`FromStr` from the snake-case wire names.
macro_rules! wire_names {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// The wire name of this variant.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ParseStatusError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(ParseStatusError {
                        kind: $kind,
                        value: s.to_owned(),
                    }),
                }
            }
        }
    };
}

/// Stock status shown on the storefront.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "product_status", rename_all = "lowercase")
)]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Available,
    Limited,
    #[serde(rename = "soldout")]
    SoldOut,
}

wire_names!(ProductStatus, "product status", {
    Available => "available",
    Limited => "limited",
    SoldOut => "soldout",
});

impl ProductStatus {
    /// Whether the product can be added to a cart or checked out.
    #[must_use]
    pub const fn is_purchasable(self) -> bool {
        !matches!(self, Self::SoldOut)
    }
}

/// Order fulfillment status, changed only by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

wire_names!(OrderStatus, "order status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

impl OrderStatus {
    /// Statuses reachable from `self` in one step.
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Confirmed, Self::Cancelled],
            Self::Confirmed => &[Self::Processing, Self::Cancelled],
            Self::Processing => &[Self::Shipped, Self::Cancelled],
            Self::Shipped => &[Self::Delivered],
            Self::Delivered | Self::Cancelled => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }
}

/// Order payment status, changed only by administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Failed,
    Refunded,
}

wire_names!(PaymentStatus, "payment status", {
    Pending => "pending",
    Paid => "paid",
    Failed => "failed",
    Refunded => "refunded",
});

impl PaymentStatus {
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Paid, Self::Failed],
            Self::Failed => &[Self::Paid, Self::Pending],
            Self::Paid => &[Self::Refunded],
            Self::Refunded => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
    BankTransfer,
}

wire_names!(PaymentMethod, "payment method", {
    CashOnDelivery => "cash_on_delivery",
    BankTransfer => "bank_transfer",
});

/// Auction lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "auction_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    #[default]
    Draft,
    Active,
    Ended,
    Cancelled,
}

wire_names!(AuctionStatus, "auction status", {
    Draft => "draft",
    Active => "active",
    Ended => "ended",
    Cancelled => "cancelled",
});

impl AuctionStatus {
    #[must_use]
    pub const fn next_statuses(self) -> &'static [Self] {
        match self {
            Self::Draft => &[Self::Active, Self::Cancelled],
            Self::Active => &[Self::Ended, Self::Cancelled],
            Self::Ended | Self::Cancelled => &[],
        }
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.next_statuses().contains(&next)
    }
}

/// Contact request handling status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "contact_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    New,
    Read,
    Replied,
}

wire_names!(ContactStatus, "contact status", {
    New => "new",
    Read => "read",
    Replied => "replied",
});

/// Appointment booking status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "appointment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[default]
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

wire_names!(AppointmentStatus, "appointment status", {
    Pending => "pending",
    Confirmed => "confirmed",
    Cancelled => "cancelled",
    Completed => "completed",
});

impl AppointmentStatus {
    /// Whether the booking still occupies its slot.
    #[must_use]
    pub const fn holds_slot(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

/// What a notification is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "notification_kind", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewContact,
    NewAppointment,
    StatusUpdate,
    NewOrder,
    Outbid,
    AuctionWon,
}

wire_names!(NotificationKind, "notification kind", {
    NewContact => "new_contact",
    NewAppointment => "new_appointment",
    StatusUpdate => "status_update",
    NewOrder => "new_order",
    Outbid => "outbid",
    AuctionWon => "auction_won",
});

/// How a setting value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "setting_type", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SettingType {
    #[default]
    Text,
    Number,
    Boolean,
    Json,
}

wire_names!(SettingType, "setting type", {
    Text => "text",
    Number => "number",
    Boolean => "boolean",
    Json => "json",
});

impl SettingType {
    /// Check that `value` is a valid literal of this type.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the value does not parse.
    pub fn validate(self, value: &str) -> Result<(), String> {
        match self {
            Self::Text => Ok(()),
            Self::Number => value
                .trim()
                .parse::<f64>()
                .map(|_| ())
                .map_err(|_| format!("'{value}' is not a number")),
            Self::Boolean => match value.trim() {
                "true" | "false" => Ok(()),
                _ => Err(format!("'{value}' is not true or false")),
            },
            Self::Json => serde_json::from_str::<serde_json::Value>(value)
                .map(|_| ())
                .map_err(|e| format!("invalid JSON: {e}")),
        }
    }
}

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "user_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

wire_names!(UserRole, "user role", {
    Customer => "customer",
    Admin => "admin",
});

/// Outcome of an SMS send attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "sms_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum SmsStatus {
    Sent,
    Failed,
}

wire_names!(SmsStatus, "sms status", {
    Sent => "sent",
    Failed => "failed",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ProductStatus::SoldOut).ok().as_deref(),
            Some("\"soldout\"")
        );
        assert_eq!("limited".parse(), Ok(ProductStatus::Limited));
        assert!("sold_out".parse::<ProductStatus>().is_err());
        assert!(!ProductStatus::SoldOut.is_purchasable());
        assert!(ProductStatus::Limited.is_purchasable());
    }

    #[test]
    fn test_order_status_transitions() {
        assert!(OrderStatus::Pending.can_transition_to(OrderStatus::Confirmed));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Delivered));
        assert!(!OrderStatus::Pending.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_terminal_order_statuses_have_no_exits() {
        for status in OrderStatus::ALL {
            assert_eq!(status.is_terminal(), status.next_statuses().is_empty());
        }
    }

    #[test]
    fn test_payment_status_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Failed.can_transition_to(PaymentStatus::Paid));
        assert!(PaymentStatus::Paid.can_transition_to(PaymentStatus::Refunded));
        assert!(!PaymentStatus::Refunded.can_transition_to(PaymentStatus::Paid));
        assert!(!PaymentStatus::Pending.can_transition_to(PaymentStatus::Refunded));
    }

    #[test]
    fn test_auction_status_transitions() {
        assert!(AuctionStatus::Draft.can_transition_to(AuctionStatus::Active));
        assert!(AuctionStatus::Active.can_transition_to(AuctionStatus::Ended));
        assert!(!AuctionStatus::Ended.can_transition_to(AuctionStatus::Active));
        assert!(!AuctionStatus::Draft.can_transition_to(AuctionStatus::Ended));
    }

    #[test]
    fn test_setting_type_validation() {
        assert!(SettingType::Number.validate("12.5").is_ok());
        assert!(SettingType::Number.validate("twelve").is_err());
        assert!(SettingType::Boolean.validate("true").is_ok());
        assert!(SettingType::Boolean.validate("yes").is_err());
        assert!(SettingType::Json.validate("[\"10:00\"]").is_ok());
        assert!(SettingType::Json.validate("[").is_err());
        assert!(SettingType::Text.validate("anything").is_ok());
    }

    #[test]
    fn test_display_matches_serde() {
        for kind in NotificationKind::ALL {
            let json = serde_json::to_string(kind).ok();
            assert_eq!(json, Some(format!("\"{kind}\"")));
        }
    }
}
