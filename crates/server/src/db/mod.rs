//! Storage for the storefront and back office.
//!
//! Two backends implement the same repository traits:
//!
//! - [`postgres::PgStorage`] when `TASFIYA_DATABASE_URL` (or `DATABASE_URL`)
//!   is set. Migrations live in `crates/server/migrations/` and run via
//!   `tasfiya-cli migrate`.
//! - [`memory::MemoryStorage`] otherwise, and in tests.
//!
//! Handlers only see `Arc<dyn Storage>`.
//!
//! # Atomicity
//!
//! Bid placement, checkout, main-image switching and appointment booking
//! each run as one unit: under a single write guard in memory, inside one
//! transaction with `SELECT ... FOR UPDATE` in Postgres. Operations that a
//! business rule can refuse return `Ok(Err(reason))` so that the refusal is
//! decided inside that unit.

pub mod memory;
pub mod postgres;

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use tasfiya_core::{
    AppointmentId, AppointmentStatus, AuctionId, AuctionStatus, CartItemId, CategoryId,
    ContactId, ContactStatus, NotificationId, OrderId, OrderStatus, PaymentStatus, Phone,
    ProductId, ProductImageId, SettingType, UserId,
};

use crate::models::order::SnapshotError;
use crate::models::{
    Appointment, Auction, AuctionInput, Bid, BidPlacement, BidRejection, BidRequest, CartItem,
    CartOwner, Category, CategoryInput, Contact, DashboardStats, NewAppointment, NewContact,
    NewNotification, NewOrder, NewProductImage, NewSmsMessage, NewUser, Notification, Order,
    OrderFilter, Product, ProductFilter, ProductImage, ProductInput, Setting, SmsMessage, User,
};

pub use memory::MemoryStorage;
pub use postgres::PgStorage;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation or stale state (unique phone, full slot,
    /// concurrent status change).
    #[error("conflict: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[async_trait]
pub trait UserRepository {
    /// # Errors
    ///
    /// `Conflict` when the phone is already registered.
    async fn create_user(&self, user: NewUser) -> Result<User, RepositoryError>;

    async fn get_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    async fn get_user_by_phone(&self, phone: &Phone) -> Result<Option<User>, RepositoryError>;

    /// Ids of every administrator, for fan-out notifications.
    async fn admin_ids(&self) -> Result<Vec<UserId>, RepositoryError>;
}

#[async_trait]
pub trait CatalogRepository {
    async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError>;

    async fn get_category(&self, id: CategoryId) -> Result<Option<Category>, RepositoryError>;

    /// # Errors
    ///
    /// `Conflict` when the slug is taken.
    async fn create_category(&self, input: CategoryInput) -> Result<Category, RepositoryError>;

    async fn update_category(
        &self,
        id: CategoryId,
        input: CategoryInput,
    ) -> Result<Category, RepositoryError>;

    /// Delete a category; its products become uncategorized.
    async fn delete_category(&self, id: CategoryId) -> Result<(), RepositoryError>;

    /// Products passing `filter`, ordered by display order then id.
    async fn list_products(&self, filter: &ProductFilter) -> Result<Vec<Product>, RepositoryError>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError>;

    /// Products among `ids`; unknown ids are skipped.
    async fn get_products(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    /// Insert a product. A given `image_url` becomes its main image, and a
    /// missing display order appends it to the end of the list.
    async fn create_product(&self, input: ProductInput) -> Result<Product, RepositoryError>;

    /// Update product fields. `image_url` is ignored; the gallery owns it.
    async fn update_product(
        &self,
        id: ProductId,
        input: ProductInput,
    ) -> Result<Product, RepositoryError>;

    /// Delete a product with its images and cart lines.
    ///
    /// # Errors
    ///
    /// `Conflict` while any auction references the product.
    async fn delete_product(&self, id: ProductId) -> Result<(), RepositoryError>;

    /// Set each product's display order to its index in `ids`.
    ///
    /// # Errors
    ///
    /// `NotFound` if any id is unknown; nothing is changed in that case.
    async fn reorder_products(&self, ids: &[ProductId]) -> Result<(), RepositoryError>;

    /// Gallery ordered by sort order then id.
    async fn list_images(&self, product: ProductId) -> Result<Vec<ProductImage>, RepositoryError>;

    /// Add an image. The first image, or one flagged main, becomes the main
    /// image and `product.image_url` follows it.
    async fn add_image(
        &self,
        product: ProductId,
        image: NewProductImage,
    ) -> Result<ProductImage, RepositoryError>;

    /// Make `image` the only main image of `product`.
    async fn set_main_image(
        &self,
        product: ProductId,
        image: ProductImageId,
    ) -> Result<ProductImage, RepositoryError>;

    /// Delete an image, promoting the lowest-sorted survivor if it was main.
    async fn delete_image(
        &self,
        product: ProductId,
        image: ProductImageId,
    ) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait CartRepository {
    async fn cart_items(&self, owner: &CartOwner) -> Result<Vec<CartItem>, RepositoryError>;

    /// Add `quantity` of a product, merging with an existing line.
    ///
    /// # Errors
    ///
    /// `Conflict` when the merged quantity would exceed the line maximum.
    async fn add_cart_item(
        &self,
        owner: &CartOwner,
        product: ProductId,
        quantity: i32,
    ) -> Result<CartItem, RepositoryError>;

    /// Set a line's quantity; zero removes it and returns `None`.
    async fn set_cart_quantity(
        &self,
        owner: &CartOwner,
        item: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartItem>, RepositoryError>;

    async fn remove_cart_item(
        &self,
        owner: &CartOwner,
        item: CartItemId,
    ) -> Result<(), RepositoryError>;

    async fn clear_cart(&self, owner: &CartOwner) -> Result<(), RepositoryError>;

    /// Move every line of `from` into `into`, clamping merged lines.
    async fn merge_carts(&self, from: &CartOwner, into: &CartOwner) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait OrderRepository {
    /// Snapshot the owner's cart into an order and empty the cart, atomically.
    ///
    /// # Errors
    ///
    /// `Conflict` when the order number is already used. Cart problems come
    /// back as `Ok(Err(_))`.
    async fn create_order(
        &self,
        order: NewOrder,
    ) -> Result<Result<Order, SnapshotError>, RepositoryError>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    async fn get_order_by_number(&self, number: &str) -> Result<Option<Order>, RepositoryError>;

    /// A user's orders, newest first.
    async fn list_user_orders(&self, user: UserId) -> Result<Vec<Order>, RepositoryError>;

    /// All orders passing `filter`, newest first.
    async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    /// Compare-and-set the fulfillment status.
    ///
    /// # Errors
    ///
    /// `Conflict` when the stored status is no longer `from`.
    async fn update_order_status(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order, RepositoryError>;

    /// Compare-and-set the payment status.
    async fn update_payment_status(
        &self,
        id: OrderId,
        from: PaymentStatus,
        to: PaymentStatus,
    ) -> Result<Order, RepositoryError>;
}

#[async_trait]
pub trait AuctionRepository {
    /// Auctions with `status` (all when `None`), soonest ending first.
    async fn list_auctions(
        &self,
        status: Option<AuctionStatus>,
    ) -> Result<Vec<Auction>, RepositoryError>;

    async fn get_auction(&self, id: AuctionId) -> Result<Option<Auction>, RepositoryError>;

    /// Insert a draft auction.
    async fn create_auction(&self, input: AuctionInput) -> Result<Auction, RepositoryError>;

    /// # Errors
    ///
    /// `Conflict` unless the auction is still a draft.
    async fn update_auction(
        &self,
        id: AuctionId,
        input: AuctionInput,
    ) -> Result<Auction, RepositoryError>;

    /// Move an auction to `to`. Ending it also settles the winner.
    ///
    /// # Errors
    ///
    /// `Conflict` when the transition is not allowed from the stored status.
    async fn transition_auction(
        &self,
        id: AuctionId,
        to: AuctionStatus,
        now: DateTime<Utc>,
    ) -> Result<Auction, RepositoryError>;

    /// Evaluate and record a bid atomically.
    async fn place_bid(
        &self,
        id: AuctionId,
        request: BidRequest,
    ) -> Result<Result<BidPlacement, BidRejection>, RepositoryError>;

    /// Bid history, newest first.
    async fn list_bids(&self, id: AuctionId) -> Result<Vec<Bid>, RepositoryError>;

    /// End every active auction whose end time is at or before `now`.
    async fn close_expired_auctions(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Auction>, RepositoryError>;
}

#[async_trait]
pub trait IntakeRepository {
    async fn create_contact(&self, contact: NewContact) -> Result<Contact, RepositoryError>;

    /// Newest first.
    async fn list_contacts(&self) -> Result<Vec<Contact>, RepositoryError>;

    async fn update_contact_status(
        &self,
        id: ContactId,
        status: ContactStatus,
    ) -> Result<Contact, RepositoryError>;

    async fn delete_contact(&self, id: ContactId) -> Result<(), RepositoryError>;

    /// Book a slot if fewer than `capacity` live bookings hold it.
    ///
    /// # Errors
    ///
    /// `Conflict` when the slot is full.
    async fn create_appointment(
        &self,
        appointment: NewAppointment,
        capacity: i64,
    ) -> Result<Appointment, RepositoryError>;

    /// Live bookings per slot on `date`.
    async fn appointment_counts(
        &self,
        date: NaiveDate,
    ) -> Result<HashMap<String, i64>, RepositoryError>;

    /// Ordered by date and slot.
    async fn list_appointments(&self) -> Result<Vec<Appointment>, RepositoryError>;

    async fn update_appointment_status(
        &self,
        id: AppointmentId,
        status: AppointmentStatus,
    ) -> Result<Appointment, RepositoryError>;

    async fn delete_appointment(&self, id: AppointmentId) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait NotificationRepository {
    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> Result<Notification, RepositoryError>;

    /// Newest first.
    async fn list_notifications(
        &self,
        user: UserId,
        limit: i64,
    ) -> Result<Vec<Notification>, RepositoryError>;

    async fn unread_count(&self, user: UserId) -> Result<i64, RepositoryError>;

    /// # Errors
    ///
    /// `NotFound` unless the notification belongs to `user`.
    async fn mark_read(
        &self,
        user: UserId,
        id: NotificationId,
    ) -> Result<Notification, RepositoryError>;

    /// Returns how many notifications changed.
    async fn mark_all_read(&self, user: UserId) -> Result<u64, RepositoryError>;
}

#[async_trait]
pub trait SettingsRepository {
    async fn list_settings(&self) -> Result<Vec<Setting>, RepositoryError>;

    async fn get_setting(&self, key: &str) -> Result<Option<Setting>, RepositoryError>;

    async fn upsert_setting(
        &self,
        key: &str,
        value: &str,
        category: &str,
        setting_type: SettingType,
    ) -> Result<Setting, RepositoryError>;

    async fn delete_setting(&self, key: &str) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait SmsRepository {
    async fn log_sms(&self, message: NewSmsMessage) -> Result<SmsMessage, RepositoryError>;

    /// Newest first.
    async fn list_sms(&self, limit: i64) -> Result<Vec<SmsMessage>, RepositoryError>;
}

/// Everything a request handler can reach.
#[async_trait]
pub trait Storage:
    UserRepository
    + CatalogRepository
    + CartRepository
    + OrderRepository
    + AuctionRepository
    + IntakeRepository
    + NotificationRepository
    + SettingsRepository
    + SmsRepository
    + Send
    + Sync
{
    /// Readiness check.
    async fn ping(&self) -> Result<(), RepositoryError>;

    async fn dashboard_stats(&self) -> Result<DashboardStats, RepositoryError>;
}
