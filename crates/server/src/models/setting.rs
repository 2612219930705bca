//! Key/value site settings.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use tasfiya_core::SettingType;

/// Settings in this category are never exposed by the public endpoint.
pub const INTERNAL_CATEGORY: &str = "internal";

/// Well-known setting keys.
pub mod keys {
    pub const CHECKOUT_ENABLED: &str = "checkout_enabled";
    pub const AUCTIONS_ENABLED: &str = "auctions_enabled";
    pub const SMS_ENABLED: &str = "sms_enabled";
    pub const SMS_ORDER_NOTIFICATIONS: &str = "sms_order_notifications";
    pub const APPOINTMENT_SLOTS: &str = "appointment_slots";
    pub const APPOINTMENT_SLOT_CAPACITY: &str = "appointment_slot_capacity";
    pub const APPOINTMENT_CLOSED_DAYS: &str = "appointment_closed_days";
}

/// Default slots when `appointment_slots` is unset: hourly from 10:00 to 17:00.
pub const DEFAULT_APPOINTMENT_SLOTS: &[&str] = &[
    "10:00", "11:00", "12:00", "13:00", "14:00", "15:00", "16:00", "17:00",
];

/// Rows written by `tasfiya-cli seed`: key, value, category, type.
pub const DEFAULT_SETTINGS: &[(&str, &str, &str, SettingType)] = &[
    (keys::CHECKOUT_ENABLED, "true", "store", SettingType::Boolean),
    (keys::AUCTIONS_ENABLED, "true", "store", SettingType::Boolean),
    (keys::SMS_ENABLED, "true", INTERNAL_CATEGORY, SettingType::Boolean),
    (keys::SMS_ORDER_NOTIFICATIONS, "false", INTERNAL_CATEGORY, SettingType::Boolean),
    (
        keys::APPOINTMENT_SLOTS,
        r#"["10:00","11:00","12:00","13:00","14:00","15:00","16:00","17:00"]"#,
        "appointments",
        SettingType::Json,
    ),
    (keys::APPOINTMENT_SLOT_CAPACITY, "1", "appointments", SettingType::Number),
    (keys::APPOINTMENT_CLOSED_DAYS, "[]", "appointments", SettingType::Json),
];

/// A stored setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Setting {
    pub key: String,
    pub value: String,
    pub category: String,
    #[serde(rename = "type")]
    pub setting_type: SettingType,
    pub updated_at: DateTime<Utc>,
}

/// Body of `PUT /api/admin/settings/{key}`.
///
/// Omitted `category`/`type` keep the existing values (or `general`/`text`
/// for a new key).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingInput {
    pub value: String,
    pub category: Option<String>,
    #[serde(rename = "type")]
    pub setting_type: Option<SettingType>,
}

/// Check a setting key: 1-100 chars of lower-case letters, digits, `_` or `.`.
///
/// # Errors
///
/// Returns a message when the key is malformed.
pub fn validate_key(key: &str) -> Result<(), String> {
    let ok = !key.is_empty()
        && key.len() <= 100
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '.');
    if ok {
        Ok(())
    } else {
        Err(format!("invalid setting key: {key}"))
    }
}

/// Point-in-time view of all settings.
#[derive(Debug, Clone, Default)]
pub struct SettingsSnapshot {
    settings: HashMap<String, Setting>,
}

impl SettingsSnapshot {
    #[must_use]
    pub fn new(settings: Vec<Setting>) -> Self {
        Self {
            settings: settings.into_iter().map(|s| (s.key.clone(), s)).collect(),
        }
    }

    /// Raw value of `key`, or `default` when unset.
    #[must_use]
    pub fn get_value(&self, key: &str, default: &str) -> String {
        self.settings
            .get(key)
            .map_or_else(|| default.to_owned(), |s| s.value.clone())
    }

    /// `true`/`false` value of `key`; anything else yields `default`.
    #[must_use]
    pub fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.settings.get(key).map(|s| s.value.trim()) {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    #[must_use]
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.settings
            .get(key)
            .and_then(|s| s.value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// JSON value of `key` decoded as `T`; missing or malformed yields `default`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.settings
            .get(key)
            .and_then(|s| serde_json::from_str(&s.value).ok())
            .unwrap_or(default)
    }

    /// `{key: value}` for every non-internal setting.
    #[must_use]
    pub fn public_values(&self) -> BTreeMap<String, String> {
        self.settings
            .values()
            .filter(|s| s.category != INTERNAL_CATEGORY)
            .map(|s| (s.key.clone(), s.value.clone()))
            .collect()
    }
}
