//! HTTP routes.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (storage ping)
//! GET  /ws                              - Notification push
//!
//! # Catalog
//! GET  /api/products                    - Listing (category, status, q)
//! GET  /api/products/{id}               - Product with gallery
//! GET  /api/categories                  - Categories
//!
//! # Cart (user or session guest)
//! GET    /api/cart                      - Current cart
//! DELETE /api/cart                      - Empty the cart
//! POST   /api/cart/items                - Add a product
//! PATCH  /api/cart/items/{id}           - Change quantity (0 removes)
//! DELETE /api/cart/items/{id}           - Remove a line
//!
//! # Orders
//! POST /api/checkout                    - Place an order from the cart
//! GET  /api/customer/orders             - Own orders
//! GET  /api/customer/orders/{id}        - One own order
//! GET  /api/orders/track/{number}       - Guest tracking (?phone=)
//!
//! # Auctions
//! GET  /api/auctions                    - Listing (?status=, default active)
//! GET  /api/auctions/{id}               - Detail with masked bid history
//! POST /api/auctions/{id}/bid           - Place a bid (rate limited)
//!
//! # Intake
//! POST /api/contact                     - Contact form
//! GET  /api/appointments/availability   - Slots for ?date=
//! POST /api/appointments                - Book a slot
//!
//! # Notifications (session user)
//! GET   /api/notifications              - Newest first (?limit=)
//! GET   /api/notifications/unread-count
//! PATCH /api/notifications/{id}/read
//! POST  /api/notifications/read-all
//!
//! # Settings and auth
//! GET  /api/settings                    - Public settings map
//! POST /api/auth/register               - Create a customer (rate limited)
//! POST /api/auth/login                  - Log in (rate limited)
//! POST /api/auth/logout
//! GET  /api/auth/me
//!
//! # Back office
//! /api/admin/...                        - See [`admin`]
//! ```

pub mod admin;
pub mod auctions;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod health;
pub mod intake;
pub mod notifications;
pub mod orders;
pub mod settings;
pub mod ws;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::middleware::{auth_rate_limiter, bid_rate_limiter};
use crate::state::AppState;

fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
        .route("/me", get(auth::me))
}

fn auction_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/{id}/bid", post(auctions::bid))
        .layer(bid_rate_limiter());

    Router::new()
        .route("/", get(auctions::list))
        .route("/{id}", get(auctions::show))
        .merge(limited)
}

fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show).delete(cart::clear))
        .route("/items", post(cart::add))
        .route(
            "/items/{id}",
            patch(cart::update).delete(cart::remove),
        )
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(notifications::list))
        .route("/unread-count", get(notifications::unread_count))
        .route("/read-all", post(notifications::mark_all_read))
        .route("/{id}/read", patch(notifications::mark_read))
}

fn api_routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::show_product))
        .route("/categories", get(catalog::list_categories))
        // Orders
        .route("/checkout", post(orders::checkout))
        .route("/customer/orders", get(orders::my_orders))
        .route("/customer/orders/{id}", get(orders::my_order))
        .route("/orders/track/{order_number}", get(orders::track))
        // Intake
        .route("/contact", post(intake::contact))
        .route("/appointments", post(intake::book))
        .route("/appointments/availability", get(intake::availability))
        .route("/settings", get(settings::public))
        .nest("/cart", cart_routes())
        .nest("/auctions", auction_routes())
        .nest("/notifications", notification_routes())
        .nest("/auth", auth_routes())
        .nest("/admin", admin::routes())
}

/// Every route of the server, without middleware or state.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/ws", get(ws::upgrade))
        .nest("/api", api_routes())
}
