//! `tasfiya-cli seed`
//!
//! Writes the default settings and a few demo categories. Rows that already
//! exist are left alone, so the command can be re-run safely.

use sqlx::PgPool;

use tasfiya_core::LocalizedText;
use tasfiya_server::db::{CatalogRepository, PgStorage, RepositoryError, SettingsRepository};
use tasfiya_server::models::CategoryInput;
use tasfiya_server::models::setting::DEFAULT_SETTINGS;

use super::CliError;

/// Slug, English name, Arabic name.
const DEMO_CATEGORIES: &[(&str, &str, &str)] = &[
    ("home-appliances", "Home Appliances", "أجهزة منزلية"),
    ("furniture", "Furniture", "أثاث"),
    ("electronics", "Electronics", "إلكترونيات"),
    ("kitchen", "Kitchen", "مطبخ"),
];

/// # Errors
///
/// Returns `CliError::Repository` on storage failure.
pub async fn run(pool: PgPool) -> Result<(), CliError> {
    let storage = PgStorage::new(pool);

    let mut settings = 0;
    for (key, value, category, setting_type) in DEFAULT_SETTINGS {
        if storage.get_setting(key).await?.is_some() {
            continue;
        }
        storage
            .upsert_setting(key, value, category, *setting_type)
            .await?;
        settings += 1;
    }
    tracing::info!("Inserted {settings} default settings");

    let mut categories = 0;
    for (order, (slug, en, ar)) in (0..).zip(DEMO_CATEGORIES) {
        let input = CategoryInput {
            name: LocalizedText::new(*en, *ar),
            slug: (*slug).to_owned(),
            display_order: order,
        };
        match storage.create_category(input).await {
            Ok(_) => categories += 1,
            Err(RepositoryError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }
    tracing::info!("Inserted {categories} demo categories");

    Ok(())
}
