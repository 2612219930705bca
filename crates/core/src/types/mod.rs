//! Core types for Tasfiya.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod phone;
pub mod status;
pub mod text;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{Money, MoneyError};
pub use phone::{Phone, PhoneError};
pub use status::*;
pub use text::{Locale, LocalizedText};
