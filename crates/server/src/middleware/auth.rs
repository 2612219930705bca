//! Authentication extractors.
//!
//! The session (inserted into request extensions by `SessionManagerLayer`)
//! carries a [`CurrentUser`] after login and an anonymous cart token for
//! guests. Rejections are [`AppError`]s so they render as JSON.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CartOwner, CurrentUser, session_keys};

fn session(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_owned()))
}

async fn current_user(parts: &Parts) -> Option<CurrentUser> {
    let session = parts.extensions.get::<Session>()?;
    session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten()
}

/// Extractor that requires a logged-in user.
///
/// ```rust,ignore
/// async fn handler(RequireAuth(user): RequireAuth) -> String {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("login required".to_owned()))
    }
}

/// Extractor that requires a logged-in administrator.
///
/// Anonymous requests get 401, customers get 403.
pub struct RequireAdmin(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = current_user(parts)
            .await
            .ok_or_else(|| AppError::Unauthorized("login required".to_owned()))?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin hit admin route");
            return Err(AppError::Forbidden("administrator access required".to_owned()));
        }
        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await))
    }
}

/// The cart of this request: the user's when logged in, otherwise the
/// guest cart keyed by a token that is created in the session on first use.
pub struct CurrentCart(pub CartOwner);

impl<S> FromRequestParts<S> for CurrentCart
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = current_user(parts).await {
            return Ok(Self(CartOwner::User(user.id)));
        }
        let session = session(parts)?;
        if let Some(token) = guest_cart_token(&session).await? {
            return Ok(Self(CartOwner::Guest(token)));
        }
        let token = Uuid::new_v4();
        session.insert(session_keys::CART_TOKEN, token).await?;
        Ok(Self(CartOwner::Guest(token)))
    }
}

/// The guest cart token held by this session, if any.
///
/// # Errors
///
/// Returns an error if the session cannot be read.
pub async fn guest_cart_token(
    session: &Session,
) -> Result<Option<Uuid>, tower_sessions::session::Error> {
    session.get::<Uuid>(session_keys::CART_TOKEN).await
}

/// Store the logged-in user in the session.
///
/// The session id is cycled first so a pre-login id cannot be reused.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.remove::<Uuid>(session_keys::CART_TOKEN).await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Drop the whole session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}
