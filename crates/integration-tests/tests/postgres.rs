//! `PgStorage` against a real database.
//!
//! These need a disposable `PostgreSQL` database; migrations are applied on
//! connect:
//!
//! ```bash
//! DATABASE_URL=postgres://localhost/tasfiya_test \
//!     cargo test -p tasfiya-integration-tests --test postgres -- --ignored
//! ```
//!
//! Every test creates its own users, products and slots so runs can share
//! one database.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, NaiveDate, Utc};
use futures_util::future::join_all;
use secrecy::SecretString;
use uuid::Uuid;

use tasfiya_core::{
    AuctionId, AuctionStatus, LocalizedText, Money, OrderStatus, PaymentMethod, Phone, ProductId,
    ProductStatus, UserId, UserRole,
};
use tasfiya_integration_tests::PASSWORD;
use tasfiya_server::db::{
    AuctionRepository, CartRepository, CatalogRepository, IntakeRepository, OrderRepository,
    PgStorage, RepositoryError, UserRepository, create_pool,
};
use tasfiya_server::models::order::SnapshotError;
use tasfiya_server::models::{
    AuctionInput, BidRejection, BidRequest, CartOwner, CheckoutDetails, NewAppointment, NewOrder,
    NewUser, ProductInput,
};
use tasfiya_server::services::auth::hash_password;

async fn storage() -> PgStorage {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must point at a test database");
    let pool = create_pool(&SecretString::from(url)).await.unwrap();
    sqlx::migrate!("../server/migrations").run(&pool).await.unwrap();
    PgStorage::new(pool)
}

fn unique_digits(len: u32) -> u128 {
    Uuid::new_v4().as_u128() % 10u128.pow(len)
}

fn unique_phone() -> Phone {
    Phone::parse(&format!("05{:08}", unique_digits(8))).unwrap()
}

async fn user(storage: &PgStorage) -> UserId {
    storage
        .create_user(NewUser {
            name: "Bidder".to_owned(),
            phone: unique_phone(),
            email: None,
            role: UserRole::Customer,
            password_hash: hash_password(PASSWORD).unwrap(),
        })
        .await
        .unwrap()
        .id
}

async fn product(storage: &PgStorage, price: i64) -> ProductId {
    storage
        .create_product(ProductInput {
            title: LocalizedText::new("Desk", "مكتب"),
            description: LocalizedText::default(),
            category_id: None,
            price: Money::new(price),
            status: ProductStatus::Available,
            display_order: None,
            image_url: None,
        })
        .await
        .unwrap()
        .id
}

async fn live_auction(storage: &PgStorage) -> AuctionId {
    let now = Utc::now();
    let auction = storage
        .create_auction(AuctionInput {
            product_id: product(storage, 100).await,
            title: LocalizedText::new("Lot", "دفعة"),
            starting_price: Money::new(1000),
            reserve_price: None,
            bid_increment: Money::new(100),
            start_time: now - Duration::minutes(1),
            end_time: now + Duration::hours(1),
            auto_extend: false,
        })
        .await
        .unwrap();
    storage
        .transition_auction(auction.id, AuctionStatus::Active, now)
        .await
        .unwrap();
    auction.id
}

fn new_order(owner: CartOwner) -> NewOrder {
    NewOrder {
        owner,
        order_number: format!("TS-20261015-{:06}", unique_digits(6)),
        details: CheckoutDetails {
            customer_name: "Huda".to_owned(),
            phone: unique_phone(),
            address: "Street 1".to_owned(),
            city: "Riyadh".to_owned(),
            notes: None,
            payment_method: PaymentMethod::CashOnDelivery,
        },
    }
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database"]
async fn test_concurrent_equal_bids_accept_one() {
    let storage = storage().await;
    let auction = live_auction(&storage).await;
    let (first, second) = (user(&storage).await, user(&storage).await);
    let request = |bidder: UserId| BidRequest {
        bidder_id: bidder,
        bidder_name: "Bidder".to_owned(),
        amount: Money::new(1000),
        now: Utc::now(),
        extend_window: Duration::seconds(120),
    };

    let (a, b) = tokio::join!(
        storage.place_bid(auction, request(first)),
        storage.place_bid(auction, request(second)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, Err(BidRejection::TooLow { .. })))
    );

    let bids = storage.list_bids(auction).await.unwrap();
    assert_eq!(bids.len(), 1);
    let stored = storage.get_auction(auction).await.unwrap().unwrap();
    assert_eq!(stored.current_bid, Some(Money::new(1000)));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database"]
async fn test_concurrent_checkouts_take_cart_once() {
    let storage = storage().await;
    let desk = product(&storage, 1250).await;
    let owner = CartOwner::Guest(Uuid::new_v4());
    storage.add_cart_item(&owner, desk, 2).await.unwrap();

    let (a, b) = tokio::join!(
        storage.create_order(new_order(owner)),
        storage.create_order(new_order(owner)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let placed: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).collect();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed.first().unwrap().total, Money::new(2500));
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, Err(SnapshotError::EmptyCart)))
    );
    assert!(storage.cart_items(&owner).await.unwrap().is_empty());
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database"]
async fn test_order_status_compare_and_set() {
    let storage = storage().await;
    let desk = product(&storage, 500).await;
    let owner = CartOwner::Guest(Uuid::new_v4());
    storage.add_cart_item(&owner, desk, 1).await.unwrap();
    let order = storage.create_order(new_order(owner)).await.unwrap().unwrap();

    let (a, b) = tokio::join!(
        storage.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Confirmed),
        storage.update_order_status(order.id, OrderStatus::Pending, OrderStatus::Cancelled),
    );
    let outcomes = [a, b];
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 1);
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, Err(RepositoryError::Conflict(_))))
    );

    let stale = storage
        .update_order_status(order.id, OrderStatus::Pending, OrderStatus::Shipped)
        .await;
    assert!(matches!(stale, Err(RepositoryError::Conflict(_))));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database"]
async fn test_concurrent_bookings_respect_capacity() {
    let storage = storage().await;
    let date = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()
        + chrono::Days::new(u64::try_from(unique_digits(4)).unwrap());
    let booking = || NewAppointment {
        name: "Reem".to_owned(),
        phone: unique_phone(),
        date,
        time_slot: "10:00".to_owned(),
        notes: None,
    };

    let attempts = join_all((0..6).map(|_| storage.create_appointment(booking(), 2))).await;
    assert_eq!(attempts.iter().filter(|a| a.is_ok()).count(), 2);
    assert!(
        attempts
            .iter()
            .filter(|a| a.is_err())
            .all(|a| matches!(a, Err(RepositoryError::Conflict(_))))
    );
    let counts = storage.appointment_counts(date).await.unwrap();
    assert_eq!(counts.get("10:00"), Some(&2));
}

#[tokio::test]
#[ignore = "Requires running PostgreSQL database"]
async fn test_cart_upsert_merges_and_rejects_overflow() {
    let storage = storage().await;
    let desk = product(&storage, 100).await;
    let owner = CartOwner::User(user(&storage).await);

    storage.add_cart_item(&owner, desk, 60).await.unwrap();
    let merged = storage.add_cart_item(&owner, desk, 30).await.unwrap();
    assert_eq!(merged.quantity, 90);

    let overflow = storage.add_cart_item(&owner, desk, 10).await;
    assert!(matches!(overflow, Err(RepositoryError::Conflict(_))));
    let lines = storage.cart_items(&owner).await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines.first().unwrap().quantity, 90);
}
