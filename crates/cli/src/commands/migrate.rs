//! `tasfiya-cli migrate`
//!
//! Applies `crates/server/migrations/` and creates the `tower_sessions`
//! schema used by the Postgres session store. Both steps are idempotent.

use sqlx::PgPool;
use tower_sessions_sqlx_store::PostgresStore;

use super::CliError;

/// # Errors
///
/// Returns `CliError` if a migration or the session table creation fails.
pub async fn run(pool: PgPool) -> Result<(), CliError> {
    tracing::info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    tracing::info!("Creating session table...");
    PostgresStore::new(pool).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
