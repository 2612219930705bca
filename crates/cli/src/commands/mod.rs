pub mod admin;
pub mod migrate;
pub mod seed;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

use tasfiya_server::config::database_url_redacted;
use tasfiya_server::db::{self, RepositoryError};
use tasfiya_server::services::auth::AuthError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Missing environment variable: TASFIYA_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Auth(#[from] AuthError),
}

/// Connect to the database named by the environment.
///
/// # Errors
///
/// Returns `CliError::MissingDatabaseUrl` when neither variable is set.
pub async fn connect() -> Result<PgPool, CliError> {
    dotenvy::dotenv().ok();

    let url = std::env::var("TASFIYA_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CliError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to {}", database_url_redacted(&url));
    Ok(db::create_pool(&url).await?)
}
