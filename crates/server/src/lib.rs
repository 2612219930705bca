//! Tasfiya storefront and back-office JSON API.
//!
//! The server is a library so the integration tests can drive the full
//! router in-process; `main.rs` only wires configuration, storage and the
//! background auction closer around [`app::build_router`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
