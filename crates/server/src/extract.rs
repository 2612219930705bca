//! Extractors whose rejections render as [`AppError`] JSON.
//!
//! Axum's own `Json`, `Query` and `Path` reject with plain-text bodies.

use std::convert::Infallible;

use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::http::{header::ACCEPT_LANGUAGE, request::Parts};
use serde::Deserialize;

use tasfiya_core::Locale;

use crate::error::AppError;

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// The caller's display language.
///
/// A `lang` query value wins over `Accept-Language`; with neither, English.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestLocale(pub Locale);

#[derive(Deserialize)]
struct LangQuery {
    lang: Option<String>,
}

impl RequestLocale {
    fn from_parts(parts: &Parts) -> Self {
        let requested = Query::<LangQuery>::try_from_uri(&parts.uri)
            .ok()
            .and_then(|Query(query)| query.lang)
            .or_else(|| {
                parts
                    .headers
                    .get(ACCEPT_LANGUAGE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned)
            });
        Self(requested.as_deref().map(Locale::negotiate).unwrap_or_default())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestLocale {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_parts(parts))
    }
}
