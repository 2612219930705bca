//! Tasfiya server: storefront, auctions and back office on one JSON API.
//!
//! # Storage
//!
//! - `PostgreSQL` when `TASFIYA_DATABASE_URL` (or `DATABASE_URL`) is set.
//!   Migrations are NOT run on startup; use `tasfiya-cli migrate`.
//! - In-memory otherwise, for local development. Nothing survives a restart.
//!
//! # Background work
//!
//! The auction closer ends expired auctions every
//! `AUCTION_SWEEP_INTERVAL_SECS` and stops with the server.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use axum::ServiceExt;
use axum::extract::Request;
use sentry::integrations::tracing as sentry_tracing;
use tokio::sync::watch;
use tower::Layer;
use tower_http::normalize_path::NormalizePathLayer;
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tasfiya_server::app::build_router;
use tasfiya_server::config::{ServerConfig, database_url_redacted};
use tasfiya_server::db::{self, MemoryStorage, PgStorage, Storage};
use tasfiya_server::services::auctions::run_closer;
use tasfiya_server::services::sms::gateway_from_config;
use tasfiya_server::state::AppState;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tasfiya_server=info,tower_http=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter));
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Sentry must be initialized before the tracing subscriber
    let _sentry_guard = init_sentry(&config);
    init_tracing();

    let sms_gateway =
        gateway_from_config(config.sms.as_ref()).expect("Failed to build SMS gateway");
    let addr = config.socket_addr();

    let app = match config.database_url.clone() {
        Some(url) => {
            let pool = db::create_pool(&url)
                .await
                .expect("Failed to create database pool");
            tracing::info!(database = %database_url_redacted(&url), "Using PostgreSQL storage");
            let storage: Arc<dyn Storage> = Arc::new(PgStorage::new(pool.clone()));
            let state = AppState::new(config, storage, sms_gateway);
            Server::start(state, PostgresStore::new(pool))
        }
        None => {
            tracing::warn!("No database configured; using in-memory storage");
            let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
            let state = AppState::new(config, storage, sms_gateway);
            Server::start(state, MemoryStore::default())
        }
    };

    app.serve(addr).await;
}

/// A built router plus the handles of its background tasks.
struct Server {
    router: axum::Router,
    shutdown: watch::Sender<bool>,
    closer: tokio::task::JoinHandle<()>,
}

impl Server {
    fn start<S>(state: AppState, store: S) -> Self
    where
        S: tower_sessions::SessionStore + Clone,
    {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let closer = tokio::spawn(run_closer(state.clone(), shutdown_rx));
        Self {
            router: build_router(state, store),
            shutdown,
            closer,
        }
    }

    async fn serve(self, addr: SocketAddr) {
        let app = NormalizePathLayer::trim_trailing_slash().layer(self.router);

        tracing::info!("tasfiya-server listening on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .expect("Failed to bind to address");

        axum::serve(
            listener,
            ServiceExt::<Request>::into_make_service_with_connect_info::<SocketAddr>(app),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

        let _ = self.shutdown.send(true);
        if let Err(e) = self.closer.await {
            tracing::error!(error = %e, "Auction closer panicked");
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
