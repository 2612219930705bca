//! Test harness for the Tasfiya API.
//!
//! Tests build the real router (every middleware layer included) over
//! in-memory storage and the memory session store, then drive it with
//! `tower::ServiceExt::oneshot`. No server or database is needed:
//!
//! ```bash
//! cargo test -p tasfiya-integration-tests
//! ```
//!
//! Each [`Client`] keeps its own session cookie, so one test can act as
//! several users at once.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use tasfiya_core::{LocalizedText, Money, Phone, ProductId, ProductStatus, UserRole};
use tasfiya_server::app::build_router;
use tasfiya_server::config::ServerConfig;
use tasfiya_server::db::MemoryStorage;
use tasfiya_server::models::{NewUser, ProductInput};
use tasfiya_server::services::auth::hash_password;
use tasfiya_server::services::sms::LoggingSmsGateway;
use tasfiya_server::state::AppState;

/// Password used for every account the harness creates.
pub const PASSWORD: &str = "correct-horse-battery";

/// One application instance with fresh storage.
pub struct TestApp {
    router: Router,
    state: AppState,
}

impl TestApp {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    #[must_use]
    pub fn with_config(config: ServerConfig) -> Self {
        let state = AppState::new(
            config,
            Arc::new(MemoryStorage::new()),
            Arc::new(LoggingSmsGateway),
        );
        let router = build_router(state.clone(), MemoryStore::default());
        Self { router, state }
    }

    #[must_use]
    pub const fn state(&self) -> &AppState {
        &self.state
    }

    /// Serve the same router on an ephemeral local port and return its
    /// address. Sessions are shared with [`Self::client`] cookies.
    pub async fn listen(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let service = self
            .router
            .clone()
            .into_make_service_with_connect_info::<SocketAddr>();
        tokio::spawn(async move {
            axum::serve(listener, service).await.unwrap();
        });
        addr
    }

    /// A client with an empty cookie jar.
    #[must_use]
    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
            language: None,
        }
    }

    /// Create an administrator directly in storage and return a client
    /// logged in as them.
    pub async fn admin(&self, phone: &str) -> Client {
        self.state
            .storage()
            .create_user(NewUser {
                name: "Store Admin".to_owned(),
                phone: Phone::parse(phone).unwrap(),
                email: None,
                role: UserRole::Admin,
                password_hash: hash_password(PASSWORD).unwrap(),
            })
            .await
            .unwrap();
        let mut client = self.client();
        let (status, _) = client.login(phone).await;
        assert_eq!(status, StatusCode::OK);
        client
    }

    /// Register a customer through the API and return their client.
    pub async fn customer(&self, name: &str, phone: &str) -> Client {
        let mut client = self.client();
        let (status, body) = client
            .post(
                "/api/auth/register",
                serde_json::json!({"name": name, "phone": phone, "password": PASSWORD}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        client
    }

    /// Insert a product directly in storage.
    pub async fn product(&self, title: &str, price: i64, status: ProductStatus) -> ProductId {
        self.state
            .storage()
            .create_product(ProductInput {
                title: LocalizedText::new(title, "منتج"),
                description: LocalizedText::default(),
                category_id: None,
                price: Money::new(price),
                status,
                display_order: None,
                image_url: None,
            })
            .await
            .unwrap()
            .id
    }
}

impl Default for TestApp {
    fn default() -> Self {
        Self::new()
    }
}

/// A cookie-carrying client for one [`TestApp`].
pub struct Client {
    router: Router,
    cookie: Option<String>,
    language: Option<String>,
}

impl Client {
    /// Send `Accept-Language: <value>` with every later request.
    pub fn accept_language(&mut self, value: &str) {
        self.language = Some(value.to_owned());
    }

    /// The session cookie pair (`name=value`) once the server has set one.
    #[must_use]
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    /// Send a request and return the status with the JSON body
    /// (`Value::Null` for an empty body).
    pub async fn request(
        &mut self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        if let Some(language) = &self.language {
            builder = builder.header(header::ACCEPT_LANGUAGE, language);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_owned();
            self.cookie = Some(pair);
        }

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, json)
    }

    pub async fn get(&mut self, path: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn patch(&mut self, path: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&mut self, path: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, None).await
    }

    pub async fn login(&mut self, phone: &str) -> (StatusCode, Value) {
        self.post(
            "/api/auth/login",
            serde_json::json!({"phone": phone, "password": PASSWORD}),
        )
        .await
    }
}

/// Checkout form used by most tests.
#[must_use]
pub fn checkout_form(phone: &str) -> Value {
    serde_json::json!({
        "customerName": "Maha",
        "phone": phone,
        "address": "12 Olaya St",
        "city": "Riyadh",
        "paymentMethod": "cash_on_delivery"
    })
}
