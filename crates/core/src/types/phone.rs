//! Phone number type.
//!
//! Phones identify customers (login, order tracking) and are the SMS
//! destination, so they are stored in a single normalized form: an optional
//! leading `+` followed by 8-15 digits.

use core::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static PHONE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // Literal pattern, checked by tests
    Regex::new(r"^\+?[0-9]{8,15}$").expect("phone pattern is valid")
});

/// Errors that can occur when parsing a [`Phone`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone number cannot be empty")]
    Empty,
    #[error("phone number must be 8-15 digits with an optional leading +")]
    Invalid,
}

/// A normalized phone number.
///
/// Spaces, dashes, dots and parentheses are stripped before validation.
///
/// ```
/// use tasfiya_core::Phone;
///
/// let phone = Phone::parse("+966 50-123-4567").unwrap();
/// assert_eq!(phone.as_str(), "+966501234567");
/// assert!(Phone::parse("12-34").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct Phone(String);

impl Phone {
    /// Parse and normalize a phone number.
    ///
    /// # Errors
    ///
    /// Returns `PhoneError::Empty` for blank input and `PhoneError::Invalid`
    /// when the normalized form does not match the accepted pattern.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
            .collect();

        if normalized.is_empty() {
            return Err(PhoneError::Empty);
        }
        if !PHONE_PATTERN.is_match(&normalized) {
            return Err(PhoneError::Invalid);
        }

        Ok(Self(normalized))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last four digits, used when echoing a phone back to someone who
    /// is not its owner.
    #[must_use]
    pub fn masked(&self) -> String {
        let digits = self.0.trim_start_matches('+');
        let visible = digits.len().saturating_sub(4);
        let tail = digits.get(visible..).unwrap_or_default();
        format!("{}{tail}", "*".repeat(visible))
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Phone {
    type Err = PhoneError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Phone {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Phone> for String {
    fn from(phone: Phone) -> Self {
        phone.0
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Phone {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Phone {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Phone {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
