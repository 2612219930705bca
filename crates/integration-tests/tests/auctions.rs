//! Auction lifecycle and bidding over HTTP.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Value, json};

use tasfiya_core::{ProductId, ProductStatus};
use tasfiya_integration_tests::{Client, TestApp};

fn auction_body(product: ProductId, ends_in: Duration, auto_extend: bool) -> Value {
    let now = Utc::now();
    json!({
        "productId": product,
        "title": {"en": "Vintage radio", "ar": "راديو قديم"},
        "startingPrice": 10000,
        "bidIncrement": 500,
        "startTime": (now - Duration::minutes(5)).to_rfc3339(),
        "endTime": (now + ends_in).to_rfc3339(),
        "autoExtend": auto_extend
    })
}

/// Create and start an auction, returning its id.
async fn live_auction(admin: &mut Client, body: Value) -> i64 {
    let (status, auction) = admin.post("/api/admin/auctions", body).await;
    assert_eq!(status, StatusCode::CREATED, "{auction}");
    assert_eq!(auction["status"], "draft");
    let id = auction["id"].as_i64().unwrap();

    let (status, auction) = admin
        .post(&format!("/api/admin/auctions/{id}/start"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{auction}");
    assert_eq!(auction["status"], "active");
    id
}

async fn bid(client: &mut Client, auction: i64, amount: i64) -> (StatusCode, Value) {
    client
        .post(
            &format!("/api/auctions/{auction}/bid"),
            json!({"amount": amount}),
        )
        .await
}

#[tokio::test]
async fn test_bidding_rules_and_outbid_notification() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let radio = app.product("Radio", 20000, ProductStatus::Available).await;
    let id = live_auction(&mut admin, auction_body(radio, Duration::hours(2), false)).await;
    let mut first = app.customer("Fahad Alqahtani", "0501000001").await;
    let mut second = app.customer("Noura", "0501000002").await;

    let (status, _) = bid(&mut first, id, 9999).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, detail) = bid(&mut first, id, 10000).await;
    assert_eq!(status, StatusCode::OK, "{detail}");
    assert_eq!(detail["currentBid"], 10000);
    assert_eq!(detail["minimumBid"], 10500);

    // The leader cannot bid against themselves.
    let (status, _) = bid(&mut first, id, 11000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = bid(&mut second, id, 10499).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, detail) = bid(&mut second, id, 10500).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["bidCount"], 2);

    let (_, notes) = first.get("/api/notifications").await;
    assert_eq!(notes[0]["kind"], "outbid");
    let (_, notes) = second.get("/api/notifications").await;
    assert_eq!(notes, json!([]));

    let (status, detail) = app.client().get(&format!("/api/auctions/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    let bids = detail["bids"].as_array().unwrap();
    assert_eq!(bids.len(), 2);
    assert_eq!(bids[0]["amount"], 10500);
    let masked = bids[1]["bidderName"].as_str().unwrap();
    assert_ne!(masked, "Fahad Alqahtani");
    assert!(detail.get("leaderId").is_none());

    let (_, listed) = app.client().get("/api/auctions").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_bid_inside_window_extends_end_time() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let clock = app.product("Clock", 5000, ProductStatus::Available).await;
    let id = live_auction(&mut admin, auction_body(clock, Duration::seconds(60), true)).await;
    let mut bidder = app.customer("Reem", "0501000003").await;

    let before = Utc::now();
    let (status, detail) = bid(&mut bidder, id, 10000).await;
    assert_eq!(status, StatusCode::OK);

    let end: DateTime<Utc> = detail["endTime"].as_str().unwrap().parse().unwrap();
    // Default window is 120 seconds from the bid.
    assert!(end >= before + Duration::seconds(119));
    assert!(end <= Utc::now() + Duration::seconds(121));
}

#[tokio::test]
async fn test_bids_need_login_and_an_active_auction() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let sofa = app.product("Sofa", 50000, ProductStatus::Available).await;
    let (_, draft) = admin
        .post("/api/admin/auctions", auction_body(sofa, Duration::hours(1), false))
        .await;
    let id = draft["id"].as_i64().unwrap();

    let (status, _) = bid(&mut app.client(), id, 10000).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut bidder = app.customer("Majed", "0501000004").await;
    let (status, _) = bid(&mut bidder, id, 10000).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = bid(&mut bidder, 9999, 10000).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Drafts are editable, live auctions are not.
    let (status, _) = admin
        .put(
            &format!("/api/admin/auctions/{id}"),
            auction_body(sofa, Duration::hours(3), true),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    admin
        .post(&format!("/api/admin/auctions/{id}/start"), json!({}))
        .await;
    let (status, _) = admin
        .put(
            &format!("/api/admin/auctions/{id}"),
            auction_body(sofa, Duration::hours(4), true),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = admin
        .post(&format!("/api/admin/auctions/{id}/start"), json!({}))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_auction_validation() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let desk = app.product("Desk", 5000, ProductStatus::Available).await;

    let mut body = auction_body(desk, Duration::hours(1), false);
    body["endTime"] = body["startTime"].clone();
    let (status, _) = admin.post("/api/admin/auctions", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = auction_body(desk, Duration::hours(1), false);
    body["bidIncrement"] = json!(0);
    let (status, _) = admin.post("/api/admin/auctions", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = auction_body(desk, Duration::hours(1), false);
    body["reservePrice"] = json!(5000);
    let (status, _) = admin.post("/api/admin/auctions", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = admin
        .post(
            "/api/admin/auctions",
            auction_body(ProductId::new(777), Duration::hours(1), false),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_ending_awards_winner_and_notifies() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let rug = app.product("Rug", 30000, ProductStatus::Available).await;
    let id = live_auction(&mut admin, auction_body(rug, Duration::hours(1), false)).await;
    let mut bidder = app.customer("Yousef", "0501000005").await;
    let (_, me) = bidder.get("/api/auth/me").await;

    bid(&mut bidder, id, 12000).await;
    let (status, ended) = admin
        .post(&format!("/api/admin/auctions/{id}/end"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ended["status"], "ended");
    assert_eq!(ended["winnerId"], me["id"]);

    let (_, notes) = bidder.get("/api/notifications").await;
    assert_eq!(notes[0]["kind"], "auction_won");

    let (status, _) = bid(&mut bidder, id, 20000).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, active) = app.client().get("/api/auctions").await;
    assert_eq!(active, json!([]));
    let (_, ended_list) = app.client().get("/api/auctions?status=ended").await;
    assert_eq!(ended_list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_disabled_auctions_reject_bids() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let bike = app.product("Bike", 40000, ProductStatus::Available).await;
    let id = live_auction(&mut admin, auction_body(bike, Duration::hours(1), false)).await;
    let mut bidder = app.customer("Hind", "0501000006").await;

    let (status, _) = admin
        .put(
            "/api/admin/settings/auctions_enabled",
            json!({"value": "false", "category": "store", "type": "boolean"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = bid(&mut bidder, id, 10000).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].as_str().unwrap().contains("disabled"));
}
