//! `tasfiya-cli admin create`

use sqlx::PgPool;

use tasfiya_core::UserRole;
use tasfiya_server::db::PgStorage;
use tasfiya_server::services::auth::{AuthService, Registration};

use super::CliError;

/// Create an administrator account.
///
/// Goes through the same validation and hashing as customer registration.
///
/// # Errors
///
/// Returns `CliError::Auth` for invalid input or a phone that is already
/// registered.
pub async fn create(
    pool: PgPool,
    name: String,
    phone: String,
    password: String,
) -> Result<(), CliError> {
    let storage = PgStorage::new(pool);
    let user = AuthService::new(&storage)
        .register(
            Registration {
                name,
                phone,
                email: None,
                password,
            },
            UserRole::Admin,
        )
        .await?;

    tracing::info!(
        "Created administrator {} (id {}, phone {})",
        user.name,
        user.id,
        user.phone.masked()
    );
    Ok(())
}
