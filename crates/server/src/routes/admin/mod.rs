//! Back-office routes under `/api/admin`.
//!
//! Every route requires an administrator session; the guard is a route
//! layer built from [`RequireAdmin`], so anonymous requests get 401 and
//! customers 403 before any handler runs.

pub mod auctions;
pub mod catalog;
pub mod dashboard;
pub mod intake;
pub mod orders;
pub mod settings;
pub mod sms;

use axum::{
    Router,
    middleware::from_extractor,
    routing::{delete, get, patch, post, put},
};

use crate::middleware::RequireAdmin;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard::stats))
        // Catalog
        .route("/products", post(catalog::create_product))
        .route("/products/reorder", post(catalog::reorder_products))
        .route(
            "/products/{id}",
            put(catalog::update_product).delete(catalog::delete_product),
        )
        .route(
            "/products/{id}/images",
            get(catalog::list_images).post(catalog::add_image),
        )
        .route("/products/{id}/images/{image_id}", delete(catalog::delete_image))
        .route(
            "/products/{id}/images/{image_id}/main",
            put(catalog::set_main_image),
        )
        .route("/categories", post(catalog::create_category))
        .route(
            "/categories/{id}",
            put(catalog::update_category).delete(catalog::delete_category),
        )
        // Orders
        .route("/orders", get(orders::list))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", patch(orders::update_status))
        .route(
            "/orders/{id}/payment-status",
            patch(orders::update_payment_status),
        )
        // Auctions
        .route("/auctions", get(auctions::list).post(auctions::create))
        .route("/auctions/{id}", put(auctions::update))
        .route("/auctions/{id}/start", post(auctions::start))
        .route("/auctions/{id}/end", post(auctions::end))
        .route("/auctions/{id}/cancel", post(auctions::cancel))
        // Intake
        .route("/contacts", get(intake::list_contacts))
        .route("/contacts/{id}", delete(intake::delete_contact))
        .route("/contacts/{id}/status", patch(intake::update_contact))
        .route("/appointments", get(intake::list_appointments))
        .route("/appointments/{id}", delete(intake::delete_appointment))
        .route(
            "/appointments/{id}/status",
            patch(intake::update_appointment),
        )
        // Settings
        .route("/settings", get(settings::list))
        .route("/settings/{key}", put(settings::put).delete(settings::delete))
        // SMS
        .route("/sms/send", post(sms::send))
        .route("/sms/messages", get(sms::messages))
        .route_layer(from_extractor::<RequireAdmin>())
}
