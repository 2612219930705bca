//! Customer and administrator accounts.

use chrono::{DateTime, Utc};
use serde::Serialize;

use tasfiya_core::{Email, Phone, UserId, UserRole};

/// A registered account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub phone: Phone,
    pub email: Option<Email>,
    pub role: UserRole,
    #[serde(skip)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Parameters for creating an account. The password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub phone: Phone,
    pub email: Option<Email>,
    pub role: UserRole,
    pub password_hash: String,
}
