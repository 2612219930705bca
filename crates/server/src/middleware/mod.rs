//! HTTP middleware and extractors.
//!
//! # Layer order (outermost first)
//!
//! 1. Sentry (hub per request, transaction per route)
//! 2. `TraceLayer`
//! 3. Request ID
//! 4. CORS
//! 5. Session (`tower-sessions`)
//!
//! Rate limiters are attached per route group in [`crate::routes`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use auth::{
    CurrentCart, OptionalAuth, RequireAdmin, RequireAuth, clear_current_user, guest_cart_token,
    set_current_user,
};
pub use rate_limit::{auth_rate_limiter, bid_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
