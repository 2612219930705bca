//! Business logic between the route handlers and storage.
//!
//! # Services
//!
//! - `auth` - Phone/password registration and login (Argon2id)
//! - `cart` - Cart lines for users and guests
//! - `orders` - Checkout snapshot and the order/payment workflows
//! - `auctions` - Bidding, admin lifecycle and the background closer
//! - `intake` - Contact messages and appointment slots
//! - `notifications` - Persist-then-push notifications
//! - `settings` - Cached settings snapshot
//! - `sms` - SMS gateways and the send log
//!
//! Services borrow what they need (`&dyn Storage` or `&AppState`) and are
//! built per request.

pub mod auctions;
pub mod auth;
pub mod cart;
pub mod intake;
pub mod notifications;
pub mod orders;
pub mod settings;
pub mod sms;
