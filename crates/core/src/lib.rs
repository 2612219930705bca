//! Tasfiya Core - Shared types library.
//!
//! This crate provides common types used across all Tasfiya components:
//! - `server` - Storefront and back-office JSON API
//! - `cli` - Command-line tools for migrations, seeding and admin management
//!
//! # Architecture
//!
//! The core crate contains only types and the rules attached to them - no I/O,
//! no database access, no HTTP clients. This keeps it lightweight and allows it
//! to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for IDs, money, phones, emails, bilingual text
//!   and the status enums with their transition tables

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
