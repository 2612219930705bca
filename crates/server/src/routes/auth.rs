//! Account routes: register, login, logout and the current user.
//!
//! Login and registration both fold the session's guest cart into the
//! user's cart before the session id is cycled.

use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use tower_sessions::Session;

use tasfiya_core::UserRole;

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::extract::ApiJson;
use crate::middleware::{RequireAuth, clear_current_user, guest_cart_token, set_current_user};
use crate::models::{CartOwner, CurrentUser, User};
use crate::services::auth::{AuthService, Registration};
use crate::services::cart::CartService;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    pub phone: String,
    pub password: String,
}

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    ApiJson(registration): ApiJson<Registration>,
) -> Result<(StatusCode, Json<User>)> {
    let user = AuthService::new(state.storage())
        .register(registration, UserRole::Customer)
        .await?;
    tracing::info!(user_id = %user.id, "Customer registered");
    start_session(&state, &session, &user).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<Json<User>> {
    let user = match AuthService::new(state.storage())
        .login(&body.phone, &body.password)
        .await
    {
        Ok(user) => user,
        Err(e) => {
            tracing::warn!(error = %e, "Login failed");
            return Err(e.into());
        }
    };
    start_session(&state, &session, &user).await?;
    tracing::info!(user_id = %user.id, "User logged in");
    Ok(Json(user))
}

async fn start_session(state: &AppState, session: &Session, user: &User) -> Result<()> {
    if let Some(token) = guest_cart_token(session).await? {
        CartService::new(state.storage())
            .merge(&CartOwner::Guest(token), &CartOwner::User(user.id))
            .await?;
    }
    let current = CurrentUser {
        id: user.id,
        name: user.name.clone(),
        role: user.role,
    };
    set_current_user(session, &current).await?;
    set_sentry_user(&user.id);
    add_breadcrumb("auth", "Session started", Some(&[("role", user.role.as_str())]));
    Ok(())
}

/// POST /api/auth/logout
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    state
        .storage()
        .get_user(current.id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_owned()))
}
