//! Back-office endpoints: access control, catalog, orders, intake,
//! settings and SMS.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use serde_json::{Value, json};

use tasfiya_core::ProductStatus;
use tasfiya_integration_tests::{TestApp, checkout_form};

fn product_body(title: &str, price: i64) -> Value {
    json!({
        "title": {"en": title, "ar": "منتج"},
        "price": price,
        "status": "available"
    })
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new();

    let (status, _) = app.client().get("/api/admin/dashboard").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut customer = app.customer("Salem", "0501000001").await;
    let (status, body) = customer.get("/api/admin/dashboard").await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["message"].is_string());
    let (status, _) = customer
        .post("/api/admin/products", product_body("Chair", 100))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut admin = app.admin("0500000001").await;
    let (status, stats) = admin.get("/api/admin/dashboard").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["productCount"], 0);
    assert_eq!(stats["ordersByStatus"]["pending"], 0);
}

#[tokio::test]
async fn test_product_crud_and_gallery() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;

    let mut body = product_body("Armchair", 45000);
    body["imageUrl"] = json!("https://cdn.example.com/armchair.jpg");
    let (status, product) = admin.post("/api/admin/products", body).await;
    assert_eq!(status, StatusCode::CREATED, "{product}");
    let id = product["id"].as_i64().unwrap();
    assert_eq!(product["imageUrl"], "https://cdn.example.com/armchair.jpg");

    let (status, second) = admin
        .post(
            &format!("/api/admin/products/{id}/images"),
            json!({"url": "/uploads/armchair-side.jpg"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(second["isMain"], false);
    let second_id = second["id"].as_i64().unwrap();

    let (status, main) = admin
        .put(
            &format!("/api/admin/products/{id}/images/{second_id}/main"),
            json!({}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(main["isMain"], true);

    let (_, detail) = app.client().get(&format!("/api/products/{id}")).await;
    assert_eq!(detail["imageUrl"], "/uploads/armchair-side.jpg");
    let mains: Vec<&Value> = detail["images"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|i| i["isMain"] == true)
        .collect();
    assert_eq!(mains.len(), 1);

    // Deleting the main image promotes the remaining one.
    let (status, _) = admin
        .delete(&format!("/api/admin/products/{id}/images/{second_id}"))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, images) = admin.get(&format!("/api/admin/products/{id}/images")).await;
    assert_eq!(images.as_array().unwrap().len(), 1);
    assert_eq!(images[0]["isMain"], true);

    let (status, _) = admin
        .post(
            &format!("/api/admin/products/{id}/images"),
            json!({"url": "javascript:alert(1)"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = admin
        .put(
            &format!("/api/admin/products/{id}"),
            product_body("Armchair (oak)", 47000),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["price"], 47000);

    let (status, _) = admin.delete(&format!("/api/admin/products/{id}")).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.client().get(&format!("/api/products/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_product_validation() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;

    let (status, _) = admin
        .post(
            "/api/admin/products",
            json!({"title": {"en": "Only English", "ar": " "}, "price": 100}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = admin
        .post("/api/admin/products", product_body("Refund", -1))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let mut body = product_body("Orphan", 100);
    body["categoryId"] = json!(404);
    let (status, _) = admin.post("/api/admin/products", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = admin
        .post(
            "/api/admin/categories",
            json!({"name": {"en": "Kitchen", "ar": "مطبخ"}, "slug": "Not A Slug!"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, category) = admin
        .post(
            "/api/admin/categories",
            json!({"name": {"en": "Kitchen", "ar": "مطبخ"}, "slug": "kitchen"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let mut body = product_body("Pan", 2500);
    body["categoryId"] = category["id"].clone();
    let (status, _) = admin.post("/api/admin/products", body).await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, categories) = app.client().get("/api/categories").await;
    assert_eq!(categories[0]["slug"], "kitchen");
}

#[tokio::test]
async fn test_reorder_products() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let a = app.product("A", 100, ProductStatus::Available).await;
    let b = app.product("B", 100, ProductStatus::Available).await;
    let c = app.product("C", 100, ProductStatus::Available).await;

    let (status, _) = admin
        .post("/api/admin/products/reorder", json!({"ids": [c, a, b]}))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, listed) = app.client().get("/api/products").await;
    let titles: Vec<&str> = listed
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"]["en"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["C", "A", "B"]);

    let (status, _) = admin
        .post("/api/admin/products/reorder", json!({"ids": [a, a]}))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_product_in_auction_cannot_be_deleted() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let lamp = app.product("Lamp", 3000, ProductStatus::Available).await;
    let now = Utc::now();
    let (status, _) = admin
        .post(
            "/api/admin/auctions",
            json!({
                "productId": lamp,
                "title": {"en": "Lamp lot", "ar": "مصباح"},
                "startingPrice": 1000,
                "bidIncrement": 100,
                "startTime": (now + Duration::hours(1)).to_rfc3339(),
                "endTime": (now + Duration::hours(5)).to_rfc3339()
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = admin.delete(&format!("/api/admin/products/{lamp}")).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_order_status_workflow() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let mut customer = app.customer("Lama", "0501000002").await;
    let heater = app.product("Heater", 20000, ProductStatus::Available).await;

    customer
        .post("/api/cart/items", json!({"productId": heater, "quantity": 1}))
        .await;
    let (status, order) = customer
        .post("/api/checkout", checkout_form("0501000002"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = order["id"].as_i64().unwrap();
    let path = format!("/api/admin/orders/{id}/status");

    let (status, _) = admin.patch(&path, json!({"status": "shipped"})).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = admin.patch(&path, json!({"status": "teleported"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, updated) = admin.patch(&path, json!({"status": "confirmed"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "confirmed");

    let (_, notes) = customer.get("/api/notifications").await;
    assert_eq!(notes[0]["kind"], "status_update");

    let (_, pending) = admin.get("/api/admin/orders?status=pending").await;
    assert_eq!(pending, json!([]));
    let (_, confirmed) = admin.get("/api/admin/orders?status=confirmed").await;
    assert_eq!(confirmed.as_array().unwrap().len(), 1);

    let (status, paid) = admin
        .patch(
            &format!("/api/admin/orders/{id}/payment-status"),
            json!({"paymentStatus": "paid"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["paymentStatus"], "paid");

    let (_, stats) = admin.get("/api/admin/dashboard").await;
    assert_eq!(stats["revenue"], 20000);
    assert_eq!(stats["ordersByStatus"]["confirmed"], 1);

    let (status, _) = admin.get("/api/admin/orders/9999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_contacts_and_appointments_admin() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let mut visitor = app.client();

    let (status, contact) = visitor
        .post(
            "/api/contact",
            json!({
                "name": "Badr",
                "phone": "0502223333",
                "subject": "Pickup",
                "message": "Can you collect a fridge?"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let contact_id = contact["id"].as_i64().unwrap();
    assert_eq!(contact["status"], "new");

    let (status, read) = admin
        .patch(
            &format!("/api/admin/contacts/{contact_id}/status"),
            json!({"status": "replied"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(read["status"], "replied");

    let (status, _) = admin
        .delete(&format!("/api/admin/contacts/{contact_id}"))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, contacts) = admin.get("/api/admin/contacts").await;
    assert_eq!(contacts, json!([]));

    let date = (Utc::now() + Duration::days(3)).date_naive();
    let (status, appointment) = visitor
        .post(
            "/api/appointments",
            json!({
                "name": "Badr",
                "phone": "0502223333",
                "date": date.to_string(),
                "timeSlot": "10:00"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let appointment_id = appointment["id"].as_i64().unwrap();

    let (_, stats) = admin.get("/api/admin/dashboard").await;
    assert_eq!(stats["pendingAppointments"], 1);

    let (status, confirmed) = admin
        .patch(
            &format!("/api/admin/appointments/{appointment_id}/status"),
            json!({"status": "confirmed"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["status"], "confirmed");

    let (_, listed) = admin.get("/api/admin/appointments").await;
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = admin
        .delete(&format!("/api/admin/appointments/{appointment_id}"))
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, listed) = admin.get("/api/admin/appointments").await;
    assert_eq!(listed, json!([]));
}

#[tokio::test]
async fn test_settings_validation_and_public_view() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;
    let mut guest = app.client();

    let (status, _) = admin
        .put(
            "/api/admin/settings/BadKey",
            json!({"value": "x"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = admin
        .put(
            "/api/admin/settings/delivery_fee",
            json!({"value": "free", "type": "number"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, setting) = admin
        .put(
            "/api/admin/settings/store_name",
            json!({"value": "Tasfiya Riyadh"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(setting["category"], "general");
    assert_eq!(setting["type"], "text");
    admin
        .put(
            "/api/admin/settings/sms_enabled",
            json!({"value": "true", "category": "internal", "type": "boolean"}),
        )
        .await;

    let (_, public) = guest.get("/api/settings").await;
    assert_eq!(public["store_name"], "Tasfiya Riyadh");
    assert!(public.get("sms_enabled").is_none());

    // Writes invalidate the cached snapshot immediately.
    admin
        .put(
            "/api/admin/settings/store_name",
            json!({"value": "Tasfiya"}),
        )
        .await;
    let (_, public) = guest.get("/api/settings").await;
    assert_eq!(public["store_name"], "Tasfiya");

    let (status, _) = admin
        .put(
            "/api/admin/settings/checkout_enabled",
            json!({"value": "false", "category": "store", "type": "boolean"}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let kettle = app.product("Kettle", 4500, ProductStatus::Available).await;
    guest
        .post("/api/cart/items", json!({"productId": kettle, "quantity": 1}))
        .await;
    let (status, _) = guest
        .post("/api/checkout", checkout_form("0501234567"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = admin.delete("/api/admin/settings/store_name").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = admin.delete("/api/admin/settings/store_name").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_sms() {
    let app = TestApp::new();
    let mut admin = app.admin("0500000001").await;

    let (status, _) = admin
        .post(
            "/api/admin/sms/send",
            json!({"phones": ["0501111111", "not-a-number"], "message": "Sale today"}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, log) = admin.get("/api/admin/sms/messages").await;
    assert_eq!(log, json!([]));

    let (status, _) = admin
        .post(
            "/api/admin/sms/send",
            json!({"phones": ["0501111111"], "message": "   "}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, summary) = admin
        .post(
            "/api/admin/sms/send",
            json!({
                "phones": ["0501111111", "050-111-1111", "0502222222"],
                "message": "Sale today"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{summary}");
    assert_eq!(summary["sent"], 2);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["results"][0]["status"], "sent");

    let (_, log) = admin.get("/api/admin/sms/messages?limit=1").await;
    assert_eq!(log.as_array().unwrap().len(), 1);
    assert_eq!(log[0]["body"], "Sale today");

    admin
        .put(
            "/api/admin/settings/sms_enabled",
            json!({"value": "false", "category": "internal", "type": "boolean"}),
        )
        .await;
    let (status, _) = admin
        .post(
            "/api/admin/sms/send",
            json!({"phones": ["0501111111"], "message": "Sale today"}),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
